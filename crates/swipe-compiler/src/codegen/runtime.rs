//! Static assets embedded at compile time.
//!
//! The sources live in the crate's `runtime/` directory and are embedded
//! with `include_str!`.

/// Batching JSON-RPC scheduler and the base error class of JS clients.
pub const JSONRPC_SCHEDULER: &str = include_str!("../../runtime/jsonrpc_scheduler.js");
/// README template written to `.swipe/README.tpl.md` when none exists.
pub const README_TEMPLATE: &str = include_str!("../../runtime/README.tpl.md");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_exports_error_class() {
        assert!(JSONRPC_SCHEDULER.starts_with("export class JSONRPCError extends Error"));
        assert!(JSONRPC_SCHEDULER.contains("__scheduleRequest(method, params)"));
    }

    #[test]
    fn readme_template_uses_context_keys() {
        for key in ["service_name", "git.tags", "jsonrpc_doc.enabled", "root_pkg_path"] {
            assert!(README_TEMPLATE.contains(key), "{key}");
        }
    }
}
