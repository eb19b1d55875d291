use super::trait_def::Tool;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};

pub struct CurrentTimeTool;

impl CurrentTimeTool {
    fn render(now: DateTime<Utc>, local: DateTime<Local>) -> String {
        format!(
            "Current time: {} (local), {} (UTC)",
            local.format("%A %Y-%m-%d %H:%M:%S %:z"),
            now.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &'static str {
        "current_time"
    }

    fn description(&self) -> &'static str {
        "The current local date and time"
    }

    async fn invoke(&self) -> Result<String> {
        let now = Utc::now();
        Ok(Self::render(now, now.with_timezone(&Local)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_both_clocks() {
        let output = CurrentTimeTool.invoke().await.unwrap();
        assert!(output.starts_with("Current time: "));
        assert!(output.ends_with("(UTC)"));
    }

    #[test]
    fn test_render_format() {
        let now = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let rendered = CurrentTimeTool::render(now, now.with_timezone(&Local));
        assert!(rendered.contains("1970-01-01 00:00:00 (UTC)"));
    }
}
