use crate::model::Agent;
use crate::stats::Record;
use anyhow::{Context, Result, anyhow};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
    sync::Mutex,
};

struct Sink {
    writer: Box<dyn Write + Send>,
    header_due: bool,
}

/// Output sink shared by concurrent runs.
///
/// Every line is written with a single call while holding the lock,
/// so lines from different runs never interleave.
pub struct Reporter {
    sink: Mutex<Sink>,
}

impl Reporter {
    /// Create a reporter writing to `writer`.
    ///
    /// If `header` is set, the header line is written right before the first record.
    pub fn new(writer: Box<dyn Write + Send>, header: bool) -> Self {
        Self {
            sink: Mutex::new(Sink {
                writer,
                header_due: header,
            }),
        }
    }

    /// Create a reporter writing to a file, or to standard output if `file` is `None`.
    pub fn create<P: AsRef<Path>>(file: Option<P>, header: bool) -> Result<Self> {
        let writer: Box<dyn Write + Send> = match file {
            Some(file) => {
                let file = file.as_ref();
                let file =
                    File::create(file).with_context(|| format!("failed to create {file:?}"))?;
                Box::new(BufWriter::new(file))
            }
            None => Box::new(BufWriter::new(io::stdout())),
        };
        Ok(Self::new(writer, header))
    }

    /// Write one record as a single line.
    pub fn emit(&self, record: &Record) -> Result<()> {
        let line = format!("{record}\n");

        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink is poisoned"))?;

        if sink.header_due {
            let header = format!("{}\n", Record::HEADER);
            sink.writer
                .write_all(header.as_bytes())
                .context("failed to write header")?;
            sink.header_due = false;
        }

        sink.writer
            .write_all(line.as_bytes())
            .context("failed to write record")?;

        Ok(())
    }

    /// Flush buffered lines to the underlying writer.
    pub fn flush(&self) -> Result<()> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| anyhow!("report sink is poisoned"))?;
        sink.writer
            .flush()
            .context("failed to flush writer stream")?;
        Ok(())
    }
}

/// Write agents as `id,state` rows to a CSV file.
pub fn write_agent_dump<'a, P, I>(file: P, agents: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'a Agent>,
{
    let file = file.as_ref();
    let mut writer =
        csv::Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
    for agt in agents {
        writer
            .serialize(agt)
            .context("failed to serialize agent")?;
    }
    writer.flush().context("failed to flush writer stream")?;
    Ok(())
}
