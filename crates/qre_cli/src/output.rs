//! Line-by-line emission of trace records.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use qre_core::tracer::{ProfileSink, TraceRecord};

/// Writes one comma-separated record per line in fixed-point notation:
/// lambda first, then the profile probabilities, then the log-likelihood
/// when tracing in maximum-likelihood mode. A terminal record carries the
/// literal `NE` in place of lambda. Each line is fully formatted before it
/// reaches the writer, so a partial record is never emitted.
pub struct ProfileWriter<W: Write> {
    out: W,
    decimals: usize,
}

impl<W: Write> ProfileWriter<W> {
    pub fn new(out: W, decimals: usize) -> Self {
        Self { out, decimals }
    }
}

impl<W: Write> ProfileSink for ProfileWriter<W> {
    fn emit(&mut self, record: &TraceRecord) -> Result<()> {
        let mut line = String::new();
        if record.terminal {
            line.push_str("NE");
        } else {
            write!(line, "{:.*}", self.decimals, record.lambda)?;
        }
        for p in &record.profile {
            write!(line, ",{:.*}", self.decimals, p)?;
        }
        if let Some(log_like) = record.log_like {
            write!(line, ",{:.*}", self.decimals, log_like)?;
        }
        writeln!(self.out, "{line}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_to_string(record: &TraceRecord, decimals: usize) -> String {
        let mut buffer = Vec::new();
        let mut writer = ProfileWriter::new(&mut buffer, decimals);
        writer.emit(record).expect("emit should succeed");
        String::from_utf8(buffer).expect("output should be utf-8")
    }

    #[test]
    fn test_regular_record_format() {
        let record = TraceRecord {
            lambda: 1.25,
            profile: vec![0.5, 0.5],
            log_like: None,
            terminal: false,
        };
        assert_eq!(emit_to_string(&record, 6), "1.250000,0.500000,0.500000\n");
    }

    #[test]
    fn test_terminal_record_uses_ne_marker() {
        let record = TraceRecord {
            lambda: 73.0,
            profile: vec![1.0, 0.0],
            log_like: None,
            terminal: true,
        };
        assert_eq!(emit_to_string(&record, 4), "NE,1.0000,0.0000\n");
    }

    #[test]
    fn test_log_likelihood_is_appended() {
        let record = TraceRecord {
            lambda: 0.5,
            profile: vec![0.25, 0.75],
            log_like: Some(-1.5),
            terminal: false,
        };
        assert_eq!(emit_to_string(&record, 2), "0.50,0.25,0.75,-1.50\n");
    }
}
