//! Embedded pages served by the HTTP server.
//!
//! # Module Structure
//!
//! - `template` - Template types for typed variable injection
//! - `serve` - Loading and error pages (loading.html, 404.html, 503.html)
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{LOADING_HTML, LoadingVars};
//!
//! let html = LOADING_HTML.render(&LoadingVars {
//!     title: "python-basics".into(),
//!     ready_url: "/ready".into(),
//!     retry_after: 2,
//! });
//! ```

mod template;

pub use template::{Template, TemplateVars, escape_html};

pub mod serve {
    use super::{Template, TemplateVars, escape_html};

    /// Variables for loading.html.
    pub struct LoadingVars {
        pub title: String,
        /// URL polled until the server reports ready.
        pub ready_url: String,
        /// Poll interval in seconds.
        pub retry_after: u64,
    }

    impl TemplateVars for LoadingVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__TITLE__", &escape_html(&self.title))
                .replace(
                    "__READY_URL__",
                    &serde_json::to_string(&self.ready_url).unwrap_or_else(|_| "\"\"".into()),
                )
                .replace("__RETRY_MS__", &(self.retry_after * 1000).to_string())
        }
    }

    /// Variables for 404.html.
    pub struct NotFoundVars {
        pub path: String,
        /// Link target back to the tutorial.
        pub home_url: String,
    }

    impl TemplateVars for NotFoundVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__PATH__", &escape_html(&self.path))
                .replace("__HOME_URL__", &escape_html(&self.home_url))
        }
    }

    /// Page shown while the first deployment has not finished.
    pub const LOADING_HTML: Template<LoadingVars> =
        Template::new(include_str!("serve/loading.html"));

    /// Page for unknown routes and unresolvable files.
    pub const NOT_FOUND_HTML: Template<NotFoundVars> =
        Template::new(include_str!("serve/404.html"));

    /// Page sent while the server is shutting down.
    pub const UNAVAILABLE_HTML: &str = include_str!("serve/503.html");
}

#[cfg(test)]
mod tests {
    use super::serve::*;

    #[test]
    fn test_loading_page() {
        let html = LOADING_HTML.render(&LoadingVars {
            title: "python <basics>".into(),
            ready_url: "/hub/ready".into(),
            retry_after: 2,
        });
        assert!(html.contains("python &lt;basics&gt;"));
        assert!(html.contains("\"/hub/ready\""));
        assert!(html.contains("2000"));
        assert!(!html.contains("__READY_URL__"));
        assert!(!html.contains("__RETRY_MS__"));
    }

    #[test]
    fn test_not_found_page() {
        let html = NOT_FOUND_HTML.render(&NotFoundVars {
            path: "/tutorial/<x>".into(),
            home_url: "/hub/".into(),
        });
        assert!(html.contains("/tutorial/&lt;x&gt;"));
        assert!(html.contains("href=\"/hub/\""));
        assert!(!html.contains("__PATH__"));
    }

    #[test]
    fn test_unavailable_page() {
        assert!(UNAVAILABLE_HTML.contains("503"));
    }
}
