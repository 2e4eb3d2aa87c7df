//! PROSOCHE.md writer: dynamic attention items staged above a preserved
//! static tail, written atomically.

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::scoring::NousScore;

const DOMAIN_MARKER: &str = "## Domain Checks";

/// Writes `nous_root/{nous_id}/PROSOCHE.md`. Returns `true` if the file was
/// actually rewritten (skips the write if rendered content is unchanged).
pub fn update_prosoche(nous_id: &str, score: &NousScore, nous_root: &Path) -> bool {
    let dir = nous_root.join(nous_id);
    if !dir.exists() {
        warn!(nous_id, dir = %dir.display(), "nous directory missing");
        return false;
    }
    let path = dir.join("PROSOCHE.md");

    let static_section = read_static_section(&path);
    let attention = build_attention_section(score);
    let staged = build_staged_context_section(score);

    if attention.is_empty() && staged.is_empty() && static_section.is_empty() {
        return false;
    }

    let mut sections = Vec::new();
    if !attention.is_empty() {
        sections.push(attention);
    }
    if !staged.is_empty() {
        sections.push(staged);
    }
    if !static_section.is_empty() {
        sections.push(static_section);
    }
    let content = sections.join("\n\n");

    let current = std::fs::read_to_string(&path).unwrap_or_default();
    if content.trim() == current.trim() {
        return false;
    }

    if let Err(e) = atomic_write(&path, &content) {
        warn!(nous_id, error = %e, "failed to write PROSOCHE.md");
        return false;
    }

    info!(nous_id, items = score.top_signals.len(), "updated PROSOCHE.md");
    true
}

fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().expect("PROSOCHE.md path always has a parent");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let tmp = dir.join(format!(".prosoche-{pid}-{nanos}.tmp"));
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}

fn read_static_section(path: &Path) -> String {
    let Ok(text) = std::fs::read_to_string(path) else {
        return String::new();
    };
    match text.find(DOMAIN_MARKER) {
        Some(pos) => text[pos..].trim().to_string(),
        None => String::new(),
    }
}

fn build_attention_section(score: &NousScore) -> String {
    if score.top_signals.is_empty() {
        return String::new();
    }
    let mut lines = vec!["## Attention".to_string()];
    for signal in &score.top_signals {
        let prefix = if signal.urgency >= 0.8 {
            "[URGENT]"
        } else if signal.urgency >= 0.5 {
            "[ATTENTION]"
        } else {
            "[INFO]"
        };
        lines.push(format!("- {prefix} {}", signal.summary));
    }
    lines.join("\n")
}

fn build_staged_context_section(score: &NousScore) -> String {
    if score.staged_context.is_empty() {
        return String::new();
    }
    let now = Utc::now();
    let mut lines = vec!["## Staged Context".to_string()];
    for block in &score.staged_context {
        let ttl = match block.expires_at {
            Some(exp) => {
                let mins = (exp - now).num_minutes().max(0);
                format!(" (expires in {mins}m)")
            }
            None => String::new(),
        };
        lines.push(format!("### {} [{}]{ttl}", block.title, block.source));
        lines.push(block.content.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::Signal;

    fn score(signals: Vec<Signal>) -> NousScore {
        NousScore { nous_id: "syn".into(), score: 0.5, top_signals: signals, ..Default::default() }
    }

    #[test]
    fn writes_attention_section_with_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("syn")).unwrap();

        let sc = score(vec![
            Signal::new("health", "disk critical", 0.95),
            Signal::new("tasks", "due today", 0.6),
            Signal::new("rhythm", "morning check", 0.3),
        ]);

        let updated = update_prosoche("syn", &sc, dir.path());
        assert!(updated);

        let content = std::fs::read_to_string(dir.path().join("syn/PROSOCHE.md")).unwrap();
        assert!(content.contains("[URGENT] disk critical"));
        assert!(content.contains("[ATTENTION] due today"));
        assert!(content.contains("[INFO] morning check"));
    }

    #[test]
    fn preserves_static_domain_checks_tail() {
        let dir = tempfile::tempdir().unwrap();
        let nous_dir = dir.path().join("arbor");
        std::fs::create_dir_all(&nous_dir).unwrap();
        std::fs::write(nous_dir.join("PROSOCHE.md"), "## Domain Checks\n- check the build queue\n").unwrap();

        let sc = score(vec![Signal::new("tasks", "overdue item", 0.9)]);
        update_prosoche("arbor", &sc, dir.path());

        let content = std::fs::read_to_string(nous_dir.join("PROSOCHE.md")).unwrap();
        assert!(content.contains("## Domain Checks"));
        assert!(content.contains("check the build queue"));
        assert!(content.contains("[URGENT] overdue item"));
    }

    #[test]
    fn no_op_when_content_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let nous_dir = dir.path().join("syn");
        std::fs::create_dir_all(&nous_dir).unwrap();

        let sc = score(vec![Signal::new("tasks", "same item", 0.9)]);
        assert!(update_prosoche("syn", &sc, dir.path()));
        assert!(!update_prosoche("syn", &sc, dir.path()));
    }

    #[test]
    fn missing_nous_directory_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let sc = score(vec![Signal::new("tasks", "x", 0.9)]);
        assert!(!update_prosoche("ghost", &sc, dir.path()));
    }

    #[test]
    fn no_leftover_tmp_file_after_write() {
        let dir = tempfile::tempdir().unwrap();
        let nous_dir = dir.path().join("syn");
        std::fs::create_dir_all(&nous_dir).unwrap();
        let sc = score(vec![Signal::new("tasks", "x", 0.9)]);
        update_prosoche("syn", &sc, dir.path());

        let leftovers: Vec<_> = std::fs::read_dir(&nous_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
