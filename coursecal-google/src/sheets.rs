//! Sheets API v4, bound to one spreadsheet.

use async_trait::async_trait;
use coursecal_core::CourseCalResult;
use coursecal_core::services::SheetService;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::client::{GoogleClient, endpoint};

const SERVICE: &str = "sheets";

pub struct GoogleSheets {
    client: GoogleClient,
    base_url: String,
    spreadsheet_id: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct Spreadsheet {
    #[serde(default)]
    sheets: Vec<Sheet>,
}

#[derive(Deserialize)]
struct Sheet {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

impl GoogleSheets {
    pub fn new(client: GoogleClient, base_url: impl Into<String>, spreadsheet_id: impl Into<String>) -> Self {
        GoogleSheets {
            client,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetService for GoogleSheets {
    #[instrument(skip(self))]
    async fn values(&self, range: &str) -> CourseCalResult<Vec<Vec<String>>> {
        let url = endpoint(&self.base_url, &["spreadsheets", self.spreadsheet_id.as_str(), "values", range])?;
        let request = self.client.http().get(url);

        let value_range: ValueRange = self.client.json(SERVICE, request).await?;
        debug!(rows = value_range.values.len(), "Read values");

        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn append_rows(&self, range: &str, rows: Vec<Vec<String>>) -> CourseCalResult<()> {
        let append = format!("{}:append", range);
        let url = endpoint(&self.base_url, &["spreadsheets", self.spreadsheet_id.as_str(), "values", append.as_str()])?;
        let request = self
            .client
            .http()
            .post(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": rows }));

        self.client.execute(SERVICE, request, &[]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn sheet_titles(&self) -> CourseCalResult<Vec<String>> {
        let url = endpoint(&self.base_url, &["spreadsheets", self.spreadsheet_id.as_str()])?;
        let request = self
            .client
            .http()
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);

        let spreadsheet: Spreadsheet = self.client.json(SERVICE, request).await?;
        Ok(spreadsheet
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }
}
