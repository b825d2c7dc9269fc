use std::io::Write;

use serde::Serialize;

use crate::{cli::OutputFormat, error::Result};

pub struct OutputManager {
    format: OutputFormat,
}

impl OutputManager {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        Ok(match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
            OutputFormat::JsonCompact => serde_json::to_string(value)?,
        })
    }

    pub fn print<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let rendered = self.render(value)?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compact_output_is_single_line() {
        let value = json!({ "id": 1, "status": "succeeded" });

        let compact = OutputManager::new(OutputFormat::JsonCompact).render(&value).unwrap();
        assert_eq!(compact, r#"{"id":1,"status":"succeeded"}"#);

        let pretty = OutputManager::new(OutputFormat::Json).render(&value).unwrap();
        assert!(pretty.contains('\n'));
        assert_eq!(serde_json::from_str::<serde_json::Value>(&pretty).unwrap(), value);
    }
}
