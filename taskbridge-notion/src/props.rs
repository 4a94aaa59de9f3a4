//! Projection ↔ Notion property mapping (API 2025-09-03 shapes).

use std::path::Path;

use serde_json::{json, Map, Value};

use taskbridge_core::types::{RecordId, TaskStatus};
use taskbridge_sync::remote::{Projection, RemoteRecord, RemoteRef};

/// Notion rich_text payloads are capped at 2000 characters.
const RICH_TEXT_LIMIT: usize = 2000;

/// Build the named-property map for a create/update call.
pub fn to_properties(projection: &Projection, draft_root: &Path) -> Value {
    let mut props = Map::new();
    props.insert(
        "Task ID".to_owned(),
        json!({ "title": [{ "text": { "content": projection.task_id.0.as_str() } }] }),
    );
    props.insert(
        "Status".to_owned(),
        json!({ "select": { "name": projection.status.as_str() } }),
    );
    props.insert(
        "Content".to_owned(),
        rich_text(&projection.content),
    );
    props.insert(
        "Type".to_owned(),
        json!({ "select": { "name": projection.kind.as_str() } }),
    );

    if let Some(draft_content) = &projection.draft_content {
        props.insert("Draft Content".to_owned(), rich_text(draft_content));
    }
    if let Some(draft_path) = &projection.draft_path {
        // Unopenable from a phone, but useful on a workstation.
        let full = draft_root.join(draft_path);
        props.insert(
            "Draft Path".to_owned(),
            json!({ "url": format!("file://{}", full.display()) }),
        );
    }
    if let Some(url) = &projection.published_url {
        props.insert("Published URL".to_owned(), json!({ "url": url }));
    }
    if let Some(error) = &projection.error {
        props.insert("Error".to_owned(), rich_text(error));
    }
    if let Some(repo) = &projection.repo {
        props.insert("Repo".to_owned(), rich_text(repo));
    }
    if let Some(commit) = &projection.commit {
        props.insert("Commit".to_owned(), rich_text(commit));
    }

    Value::Object(props)
}

fn rich_text(text: &str) -> Value {
    let capped: String = text.chars().take(RICH_TEXT_LIMIT).collect();
    json!({ "rich_text": [{ "text": { "content": capped } }] })
}

/// Read a page object back into a remote record.
///
/// Pages without a usable `Task ID` title are dropped — the bridge cannot
/// correlate them.
pub fn from_page(page: &Value) -> Option<RemoteRecord> {
    let reference = RemoteRef(page.get("id")?.as_str()?.to_owned());
    let props = page.get("properties")?;

    let task_id = title_text(props.get("Task ID")?)?;
    if task_id.is_empty() {
        return None;
    }

    let status = props
        .get("Status")
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let content = props
        .get("Content")
        .and_then(rich_text_value)
        .unwrap_or_default();
    let kind = props
        .get("Type")
        .and_then(|p| p.get("select"))
        .and_then(|s| s.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    Some(RemoteRecord {
        reference,
        projection: Projection::new(
            RecordId(task_id),
            TaskStatus::parse(status),
            &content,
            kind,
        ),
    })
}

fn title_text(prop: &Value) -> Option<String> {
    let title = prop.get("title")?.as_array()?;
    let first = title.first()?;
    let text = first
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| {
            first
                .get("text")
                .and_then(|t| t.get("content"))
                .and_then(Value::as_str)
        })?;
    Some(text.to_owned())
}

fn rich_text_value(prop: &Value) -> Option<String> {
    let array = prop.get("rich_text")?.as_array()?;
    let first = array.first()?;
    let text = first
        .get("plain_text")
        .and_then(Value::as_str)
        .or_else(|| {
            first
                .get("text")
                .and_then(|t| t.get("content"))
                .and_then(Value::as_str)
        })?;
    Some(text.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_projection() -> Projection {
        let mut projection = Projection::new(
            RecordId::from("TASK-001"),
            TaskStatus::WaitingApproval,
            "Write about: launch day",
            "free_form",
        );
        projection.draft_path = Some("data/drafts/launch.md".to_owned());
        projection.draft_content = Some("draft body".to_owned());
        projection.published_url = Some("https://example.com/p/1".to_owned());
        projection
    }

    #[test]
    fn properties_carry_the_core_four() {
        let props = to_properties(&sample_projection(), Path::new("/pipeline"));
        assert_eq!(
            props["Task ID"]["title"][0]["text"]["content"],
            "TASK-001"
        );
        assert_eq!(props["Status"]["select"]["name"], "WAITING_APPROVAL");
        assert_eq!(
            props["Content"]["rich_text"][0]["text"]["content"],
            "Write about: launch day"
        );
        assert_eq!(props["Type"]["select"]["name"], "free_form");
    }

    #[test]
    fn draft_path_becomes_a_file_url() {
        let props = to_properties(&sample_projection(), Path::new("/pipeline"));
        assert_eq!(
            props["Draft Path"]["url"],
            "file:///pipeline/data/drafts/launch.md"
        );
    }

    #[test]
    fn absent_optional_fields_are_omitted() {
        let bare = Projection::new(RecordId::from("TASK-002"), TaskStatus::Todo, "x", "unknown");
        let props = to_properties(&bare, Path::new("/pipeline"));
        assert!(props.get("Draft Content").is_none());
        assert!(props.get("Published URL").is_none());
        assert!(props.get("Error").is_none());
    }

    #[test]
    fn content_is_capped_at_the_rich_text_limit() {
        let mut projection = sample_projection();
        projection.content = "z".repeat(5000);
        let props = to_properties(&projection, Path::new("/pipeline"));
        let content = props["Content"]["rich_text"][0]["text"]["content"]
            .as_str()
            .unwrap();
        assert_eq!(content.chars().count(), 2000);
    }

    #[test]
    fn page_roundtrips_into_a_remote_record() {
        let page = serde_json::json!({
            "id": "page-aaaa",
            "properties": {
                "Task ID": { "title": [{ "plain_text": "TKT-003" }] },
                "Status": { "select": { "name": "APPROVED" } },
                "Content": { "rich_text": [{ "plain_text": "ship it" }] },
                "Type": { "select": { "name": "ticket_process" } },
            }
        });
        let record = from_page(&page).expect("record");
        assert_eq!(record.reference, RemoteRef("page-aaaa".to_owned()));
        assert_eq!(record.projection.task_id, RecordId::from("TKT-003"));
        assert_eq!(record.projection.status, TaskStatus::Approved);
        assert_eq!(record.projection.content, "ship it");
        assert_eq!(record.projection.kind, "ticket_process");
    }

    #[test]
    fn page_without_task_id_is_dropped() {
        let page = serde_json::json!({
            "id": "page-bbbb",
            "properties": { "Task ID": { "title": [] } }
        });
        assert!(from_page(&page).is_none());
    }
}
