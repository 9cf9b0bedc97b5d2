//! Command handler for the notes API

use std::sync::Arc;
use std::time::Instant;

use notecache::{NoteCache, RefreshCache};
use notestore::{Error, Note, NoteId, NoteStore};
use tracing::{debug, warn};

use crate::resp::RespValue;
use crate::view::ApiNote;

/// Cache as served by the daemon, over whichever backend was configured
pub type SharedCache = Arc<RefreshCache<dyn NoteStore>>;

#[derive(Clone)]
pub struct CommandHandler {
    cache: SharedCache,
}

impl CommandHandler {
    pub fn new(cache: SharedCache) -> Self {
        Self { cache }
    }

    /// Run one request. May block on the store.
    pub fn handle(&self, cmd: RespValue) -> RespValue {
        let args = match cmd {
            RespValue::Array(Some(arr)) if !arr.is_empty() => arr,
            _ => return RespValue::Error("ERR invalid command format".to_string()),
        };

        let args: Vec<String> = match args.into_iter().map(into_text).collect() {
            Some(args) => args,
            None => return RespValue::Error("ERR arguments must be UTF-8 bulk strings".to_string()),
        };

        let command = args[0].to_uppercase();
        let args = &args[1..];

        match command.as_str() {
            "PING" => self.handle_ping(args),
            "NOTES.ALL" => self.handle_all(args),
            "NOTES.GET" => self.handle_get(args),
            "NOTES.ADD" => self.handle_add(args),
            "NOTES.UPDATE" => self.handle_update(args),
            "NOTES.DEL" => self.handle_del(args),
            "INFO" => self.handle_info(),
            // redis-cli sends this on connect
            "COMMAND" => RespValue::Array(Some(vec![])),
            _ => RespValue::Error(format!("ERR unknown command '{}'", command)),
        }
    }

    fn handle_ping(&self, args: &[String]) -> RespValue {
        match args {
            [] => RespValue::SimpleString("PONG".to_string()),
            [msg] => RespValue::bulk(msg.as_str()),
            _ => wrong_arity("ping"),
        }
    }

    /// Newest first, optionally restricted to notes whose title or text
    /// contains `keyword`
    fn handle_all(&self, args: &[String]) -> RespValue {
        let keyword = match args {
            [] => None,
            [keyword] => Some(keyword.as_str()),
            _ => return wrong_arity("notes.all"),
        };

        let start = Instant::now();
        let mut notes = match self.cache.find_all() {
            Ok(notes) => notes,
            Err(e) => return store_error(e),
        };
        if let Some(keyword) = keyword {
            notes.retain(|n| n.title.contains(keyword) || n.text.contains(keyword));
        }
        notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        let mut items = Vec::with_capacity(notes.len());
        for note in &notes {
            match note_json(note) {
                Ok(json) => items.push(RespValue::bulk(json)),
                Err(e) => return store_error(e),
            }
        }
        debug!(
            notes = items.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "notes.all"
        );
        RespValue::Array(Some(items))
    }

    fn handle_get(&self, args: &[String]) -> RespValue {
        let [id] = args else {
            return wrong_arity("notes.get");
        };
        note_reply(self.cache.find_by_id(&NoteId::new(id.as_str())))
    }

    fn handle_add(&self, args: &[String]) -> RespValue {
        let [title, text, tags @ ..] = args else {
            return wrong_arity("notes.add");
        };
        let note = Note::new(None, title.as_str(), text.as_str(), tags.to_vec());
        note_reply(self.cache.save(&note))
    }

    fn handle_update(&self, args: &[String]) -> RespValue {
        let [id, title, text] = args else {
            return wrong_arity("notes.update");
        };
        let note = Note::new(Some(NoteId::new(id.as_str())), title.as_str(), text.as_str(), vec![]);
        note_reply(self.cache.save(&note))
    }

    fn handle_del(&self, args: &[String]) -> RespValue {
        let [id] = args else {
            return wrong_arity("notes.del");
        };
        match self.cache.delete(&NoteId::new(id.as_str())) {
            Ok(()) => RespValue::bulk(id.as_str()),
            Err(e) => store_error(e),
        }
    }

    fn handle_info(&self) -> RespValue {
        let stats = self.cache.stats();
        let last_seen = self
            .cache
            .last_seen()
            .map(|ts| ts.to_rfc3339())
            .unwrap_or_else(|| "none".to_string());
        let info = format!(
            "# Server\r\n\
             notesd_version:{}\r\n\
             \r\n\
             # Cache\r\n\
             cached_notes:{}\r\n\
             last_seen:{}\r\n\
             full_refreshes:{}\r\n\
             delta_refreshes:{}\r\n\
             notes_pulled:{}\r\n\
             pulled_per_refresh:{:.2}\r\n\
             writes:{}\r\n\
             deletes:{}\r\n",
            env!("CARGO_PKG_VERSION"),
            self.cache.len(),
            last_seen,
            stats.full_refreshes(),
            stats.delta_refreshes(),
            stats.notes_pulled(),
            stats.pulled_per_refresh(),
            stats.writes(),
            stats.deletes(),
        );
        RespValue::bulk(info)
    }
}

fn into_text(value: RespValue) -> Option<String> {
    match value {
        RespValue::BulkString(Some(bytes)) => String::from_utf8(bytes).ok(),
        RespValue::SimpleString(s) => Some(s),
        _ => None,
    }
}

fn wrong_arity(command: &str) -> RespValue {
    RespValue::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        command
    ))
}

fn note_json(note: &Note) -> Result<Vec<u8>, Error> {
    Ok(ApiNote::from_note(note)?.to_json()?)
}

fn note_reply(result: Result<Note, Error>) -> RespValue {
    match result.and_then(|note| note_json(&note)) {
        Ok(json) => RespValue::bulk(json),
        Err(e) => store_error(e),
    }
}

fn store_error(err: Error) -> RespValue {
    match err {
        Error::NotFound(id) => RespValue::Error(format!("NOTFOUND note {}", id)),
        other => {
            warn!("request failed: {}", other);
            RespValue::Error(format!("ERR {}", other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notestore::{FileNoteStore, MemoryNoteStore};
    use tempfile::TempDir;

    fn handler() -> CommandHandler {
        let store: Arc<dyn NoteStore> = Arc::new(MemoryNoteStore::new());
        CommandHandler::new(Arc::new(RefreshCache::new(store)))
    }

    fn cmd(parts: &[&str]) -> RespValue {
        RespValue::Array(Some(parts.iter().map(|p| RespValue::bulk(*p)).collect()))
    }

    fn json(resp: &RespValue) -> serde_json::Value {
        match resp {
            RespValue::BulkString(Some(bytes)) => serde_json::from_slice(bytes).unwrap(),
            other => panic!("expected bulk string, got {:?}", other),
        }
    }

    fn all(handler: &CommandHandler, parts: &[&str]) -> Vec<serde_json::Value> {
        match handler.handle(cmd(parts)) {
            RespValue::Array(Some(items)) => items.iter().map(json).collect(),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_ping() {
        let handler = handler();
        assert_eq!(
            handler.handle(cmd(&["PING"])),
            RespValue::SimpleString("PONG".to_string())
        );
        assert_eq!(handler.handle(cmd(&["ping", "hello"])), RespValue::bulk("hello"));
    }

    #[test]
    fn test_add_and_get() {
        let handler = handler();

        let added = json(&handler.handle(cmd(&["NOTES.ADD", "Title1", "Text1", "a", "b"])));
        let id = added["id"].as_str().unwrap().to_string();
        assert_eq!(added["createdAt"], added["updatedAt"]);
        assert_eq!(added["tags"], serde_json::json!(["a", "b"]));

        let fetched = json(&handler.handle(cmd(&["NOTES.GET", &id])));
        assert_eq!(fetched["title"], "Title1");
        assert_eq!(fetched["text"], "Text1");
    }

    #[test]
    fn test_all_newest_first_with_keyword() {
        let handler = handler();
        handler.handle(cmd(&["NOTES.ADD", "groceries", "milk"]));
        handler.handle(cmd(&["NOTES.ADD", "todo", "buy milk"]));
        handler.handle(cmd(&["NOTES.ADD", "ideas", "rust"]));

        let titles: Vec<_> = all(&handler, &["NOTES.ALL"])
            .iter()
            .map(|n| n["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["ideas", "todo", "groceries"]);

        let milk = all(&handler, &["NOTES.ALL", "milk"]);
        assert_eq!(milk.len(), 2);
        assert!(all(&handler, &["NOTES.ALL", "nothing"]).is_empty());
    }

    #[test]
    fn test_update_keeps_tags() {
        let handler = handler();
        let added = json(&handler.handle(cmd(&["NOTES.ADD", "t", "x", "keep"])));
        let id = added["id"].as_str().unwrap();

        let updated = json(&handler.handle(cmd(&["NOTES.UPDATE", id, "t2", "x2"])));
        assert_eq!(updated["title"], "t2");
        assert_eq!(updated["tags"], serde_json::json!(["keep"]));
        assert_eq!(updated["createdAt"], added["createdAt"]);
    }

    #[test]
    fn test_delete_then_get() {
        let handler = handler();
        let added = json(&handler.handle(cmd(&["NOTES.ADD", "t", "x"])));
        let id = added["id"].as_str().unwrap();

        assert_eq!(handler.handle(cmd(&["NOTES.DEL", id])), RespValue::bulk(id));
        assert_eq!(
            handler.handle(cmd(&["NOTES.GET", id])),
            RespValue::Error(format!("NOTFOUND note {}", id))
        );
        assert!(all(&handler, &["NOTES.ALL"]).is_empty());
    }

    #[test]
    fn test_update_unknown_note() {
        let handler = handler();
        assert_eq!(
            handler.handle(cmd(&["NOTES.UPDATE", "missing", "t", "x"])),
            RespValue::Error("NOTFOUND note missing".to_string())
        );
    }

    #[test]
    fn test_wrong_arity_and_unknown_command() {
        let handler = handler();
        assert!(matches!(handler.handle(cmd(&["NOTES.GET"])), RespValue::Error(_)));
        assert!(matches!(handler.handle(cmd(&["NOTES.ADD", "only"])), RespValue::Error(_)));
        assert_eq!(
            handler.handle(cmd(&["FLY"])),
            RespValue::Error("ERR unknown command 'FLY'".to_string())
        );
        assert!(matches!(handler.handle(RespValue::Integer(1)), RespValue::Error(_)));
    }

    #[test]
    fn test_info_reports_refreshes() {
        let handler = handler();
        handler.handle(cmd(&["NOTES.ADD", "t", "x"]));
        handler.handle(cmd(&["NOTES.ALL"]));

        let RespValue::BulkString(Some(info)) = handler.handle(cmd(&["INFO"])) else {
            panic!("expected bulk string");
        };
        let info = String::from_utf8(info).unwrap();
        assert!(info.contains("cached_notes:1\r\n"));
        assert!(info.contains("full_refreshes:1\r\n"));
        assert!(info.contains("delta_refreshes:1\r\n"));
        assert!(info.contains("writes:1\r\n"));
    }

    #[test]
    fn test_unsaved_note_reply_is_error() {
        let note = Note::new(None, "t", "x", vec![]);
        match note_reply(Ok(note)) {
            RespValue::Error(msg) => assert!(msg.starts_with("ERR malformed record")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_file_backend() {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn NoteStore> = Arc::new(FileNoteStore::open(dir.path()).unwrap());
        let handler = CommandHandler::new(Arc::new(RefreshCache::new(store)));

        handler.handle(cmd(&["NOTES.ADD", "Title1", "Text1"]));
        handler.handle(cmd(&["NOTES.ADD", "Title2", "Text2"]));

        assert_eq!(all(&handler, &["NOTES.ALL"]).len(), 2);
    }
}
