//! CSV export of dispatch results

use csv::Writer;
use mailblast_common::types::SendResult;
use mailblast_common::Result;
use std::io;
use std::path::Path;

const HEADER: [&str; 4] = ["email", "name", "status", "message"];

/// Write results as CSV with an `email,name,status,message` header
pub fn write_csv<W: io::Write>(results: &[SendResult], writer: W) -> Result<()> {
    let mut writer = Writer::from_writer(writer);

    writer.write_record(HEADER).map_err(io::Error::from)?;
    for result in results {
        let status = result.status.to_string();
        writer
            .write_record([
                result.email.as_str(),
                result.name.as_str(),
                status.as_str(),
                result.message.as_str(),
            ])
            .map_err(io::Error::from)?;
    }

    writer.flush()?;
    Ok(())
}

/// Export results to a CSV file, replacing it if present
pub fn export_csv(results: &[SendResult], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_csv(results, io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailblast_common::types::SendStatus;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_csv_quotes_commas() {
        let mut result =
            SendResult::new("b@x.com", SendStatus::Failed, "550 rejected, mailbox full");
        result.name = "Bo".to_string();
        let results = vec![SendResult::new("a@x.com", SendStatus::Success, "sent"), result];

        let mut out = Vec::new();
        write_csv(&results, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "email,name,status,message\n\
             a@x.com,,success,sent\n\
             b@x.com,Bo,failed,\"550 rejected, mailbox full\"\n"
        );
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        export_csv(&[SendResult::new("a@x.com", SendStatus::Skipped, "")], &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("email,name,status,message\n"));
        assert!(content.contains("a@x.com,,skipped,"));
    }
}
