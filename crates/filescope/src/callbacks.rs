//! Pre-attach hooks, one per analyzer kind.

use filescope_core::{AnalyzerKind, AnalyzerRequest, FileRecord};
use std::collections::HashMap;

/// Runs before an attach request reaches the engine; may rewrite it.
pub type AddCallback = Box<dyn Fn(&FileRecord, &mut AnalyzerRequest) + Send + Sync>;

#[derive(Default)]
pub struct AnalyzerCallbacks {
    hooks: HashMap<AnalyzerKind, AddCallback>,
}

impl AnalyzerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook for `kind`, silently replacing any earlier one.
    pub fn register<F>(&mut self, kind: AnalyzerKind, callback: F)
    where
        F: Fn(&FileRecord, &mut AnalyzerRequest) + Send + Sync + 'static,
    {
        self.hooks.insert(kind, Box::new(callback));
    }

    /// Run the hook for `request.kind`, if any. Returns whether one ran.
    pub fn run(&self, record: &FileRecord, request: &mut AnalyzerRequest) -> bool {
        match self.hooks.get(&request.kind) {
            Some(hook) => {
                hook(record, request);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, kind: &AnalyzerKind) -> bool {
        self.hooks.contains_key(kind)
    }
}

impl std::fmt::Debug for AnalyzerCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.hooks.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use filescope_core::Fuid;

    #[test]
    fn test_hook_rewrites_request() {
        let mut callbacks = AnalyzerCallbacks::new();
        callbacks.register(AnalyzerKind::EXTRACT, |rec, req| {
            if req.param("extract_filename").is_none() {
                req.params
                    .insert("extract_filename".into(), format!("extract-{}", rec.fuid));
            }
        });

        let rec = FileRecord::new(Fuid::from("FxYz"), Utc::now());
        let mut req = AnalyzerRequest::new(AnalyzerKind::EXTRACT);
        assert!(callbacks.run(&rec, &mut req));
        assert_eq!(req.param("extract_filename"), Some("extract-FxYz"));
    }

    #[test]
    fn test_reregistration_overwrites() {
        let mut callbacks = AnalyzerCallbacks::new();
        callbacks.register(AnalyzerKind::MD5, |_, req| {
            req.params.insert("who".into(), "first".into());
        });
        callbacks.register(AnalyzerKind::MD5, |_, req| {
            req.params.insert("who".into(), "second".into());
        });

        let rec = FileRecord::new(Fuid::from("F1"), Utc::now());
        let mut req = AnalyzerRequest::new(AnalyzerKind::MD5);
        callbacks.run(&rec, &mut req);
        assert_eq!(req.param("who"), Some("second"));
    }

    #[test]
    fn test_no_hook_leaves_request_alone() {
        let callbacks = AnalyzerCallbacks::new();
        let rec = FileRecord::new(Fuid::from("F1"), Utc::now());
        let mut req = AnalyzerRequest::new(AnalyzerKind::SHA1);
        assert!(!callbacks.run(&rec, &mut req));
        assert!(req.params.is_empty());
        assert!(!callbacks.contains(&AnalyzerKind::SHA1));
    }
}
