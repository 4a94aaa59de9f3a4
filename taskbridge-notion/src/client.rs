//! Blocking HTTP client for the Notion-flavored mirror API.
//!
//! Calls are synchronous with a fixed request timeout and are never retried
//! automatically — retry is operator-driven (re-run the cycle).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{json, Value};

use taskbridge_core::config::Config;
use taskbridge_sync::error::RemoteError;
use taskbridge_sync::remote::{Page, Projection, RemoteRef, RemoteStore};

use crate::props;

/// API version the property shapes target.
pub const NOTION_VERSION: &str = "2025-09-03";

const PAGE_SIZE: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A connected mirror store client, bound to the database's first data
/// source.
#[derive(Debug)]
pub struct NotionStore {
    agent: ureq::Agent,
    base_url: String,
    token: String,
    data_source_id: String,
    draft_root: PathBuf,
}

impl NotionStore {
    /// Resolve the data source behind the configured database and return a
    /// ready client. The API token comes from the environment variable
    /// named in the config — it never lives in the config file itself.
    pub fn connect(config: &Config) -> Result<NotionStore, RemoteError> {
        let token = std::env::var(&config.remote.token_env).map_err(|_| {
            RemoteError::Misconfigured(format!(
                "environment variable {} is not set",
                config.remote.token_env
            ))
        })?;
        if config.remote.database_id.is_empty() {
            return Err(RemoteError::Misconfigured(
                "remote.database_id is empty; edit ~/.taskbridge/config.yaml".to_owned(),
            ));
        }

        let draft_root = pipeline_root(&config.ledger);
        let mut store = NotionStore {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            base_url: config.remote.base_url.trim_end_matches('/').to_owned(),
            token,
            data_source_id: String::new(),
            draft_root,
        };

        let database = store.get_json(&format!("databases/{}", config.remote.database_id))?;
        let data_source_id = database
            .get("data_sources")
            .and_then(Value::as_array)
            .and_then(|sources| sources.first())
            .and_then(|source| source.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                RemoteError::Misconfigured(format!(
                    "database {} has no data sources",
                    config.remote.database_id
                ))
            })?
            .to_owned();

        tracing::info!("connected to data source {data_source_id}");
        store.data_source_id = data_source_id;
        Ok(store)
    }

    fn get_json(&self, path: &str) -> Result<Value, RemoteError> {
        let response = self
            .agent
            .get(&self.url(path))
            .set("Authorization", &self.bearer())
            .set("Notion-Version", NOTION_VERSION)
            .call();
        decode(response)
    }

    fn post_json(&self, path: &str, body: Value) -> Result<Value, RemoteError> {
        let response = self
            .agent
            .post(&self.url(path))
            .set("Authorization", &self.bearer())
            .set("Notion-Version", NOTION_VERSION)
            .send_json(body);
        decode(response)
    }

    fn patch_json(&self, path: &str, body: Value) -> Result<Value, RemoteError> {
        let response = self
            .agent
            .request("PATCH", &self.url(path))
            .set("Authorization", &self.bearer())
            .set("Notion-Version", NOTION_VERSION)
            .send_json(body);
        decode(response)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl RemoteStore for NotionStore {
    fn list(&mut self, cursor: Option<String>) -> Result<Page, RemoteError> {
        let mut body = json!({ "page_size": PAGE_SIZE });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor);
        }
        let response =
            self.post_json(&format!("data_sources/{}/query", self.data_source_id), body)?;

        let records = response
            .get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().filter_map(props::from_page).collect())
            .unwrap_or_default();
        let has_more = response
            .get("has_more")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let next_cursor = response
            .get("next_cursor")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(Page {
            records,
            next_cursor,
            has_more,
        })
    }

    fn create(&mut self, projection: &Projection) -> Result<RemoteRef, RemoteError> {
        let body = json!({
            "parent": {
                "type": "data_source_id",
                "data_source_id": self.data_source_id.as_str(),
            },
            "properties": props::to_properties(projection, &self.draft_root),
        });
        let response = self.post_json("pages", body)?;
        let id = response
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RemoteError::Decode("create response missing page id".to_owned()))?;
        Ok(RemoteRef(id.to_owned()))
    }

    fn update(
        &mut self,
        reference: &RemoteRef,
        projection: &Projection,
    ) -> Result<(), RemoteError> {
        let body = json!({
            "properties": props::to_properties(projection, &self.draft_root),
        });
        self.patch_json(&format!("pages/{}", reference.0), body)?;
        Ok(())
    }
}

/// Draft paths in the ledger are relative to the pipeline root, one level
/// above the ledger's directory.
fn pipeline_root(ledger_path: &Path) -> PathBuf {
    let root = ledger_path
        .parent()
        .and_then(Path::parent)
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    // Absolute paths make usable file:// URLs.
    std::fs::canonicalize(&root).unwrap_or(root)
}

fn decode(response: Result<ureq::Response, ureq::Error>) -> Result<Value, RemoteError> {
    match response {
        Ok(res) => res
            .into_json()
            .map_err(|e| RemoteError::Decode(e.to_string())),
        Err(ureq::Error::Status(status, res)) => {
            let message = res
                .into_string()
                .unwrap_or_else(|_| "<unreadable body>".to_owned());
            Err(RemoteError::Api {
                status,
                message: clip(&message),
            })
        }
        Err(err) => Err(RemoteError::Transport(err.to_string())),
    }
}

fn clip(message: &str) -> String {
    const LIMIT: usize = 300;
    if message.chars().count() <= LIMIT {
        return message.to_owned();
    }
    message.chars().take(LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_root_is_two_levels_above_the_ledger() {
        let tmp = tempfile::TempDir::new().unwrap();
        let data = tmp.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        let root = pipeline_root(&data.join("tasks.md"));
        assert_eq!(root, std::fs::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn bare_ledger_path_falls_back_to_cwd() {
        let root = pipeline_root(Path::new("tasks.md"));
        assert!(root.is_absolute() || root == Path::new("."));
    }

    #[test]
    fn connect_without_token_is_a_config_error() {
        let mut config = Config::for_ledger(PathBuf::from("data/tasks.md"));
        config.remote.token_env = "TASKBRIDGE_TEST_TOKEN_UNSET".to_owned();
        config.remote.database_id = "db".to_owned();
        let err = NotionStore::connect(&config).unwrap_err();
        assert!(matches!(err, RemoteError::Misconfigured(_)));
    }

    #[test]
    fn clip_bounds_error_messages() {
        let long = "x".repeat(1000);
        assert_eq!(clip(&long).chars().count(), 300);
        assert_eq!(clip("short"), "short");
    }
}
