use url::form_urlencoded::byte_serialize;

/// Login entry point with `current_path` preserved as the return target
pub fn login_redirect(login_path: &str, current_path: &str) -> String {
    let return_to: String = byte_serialize(current_path.as_bytes()).collect();
    format!("{login_path}?returnTo={return_to}")
}

/// Accept only same-origin absolute paths as a post-logout target
pub fn resolve_return_to(param: Option<&str>) -> String {
    match param.map(str::trim) {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_owned(),
        _ => "/".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_keeps_path_and_query() {
        assert_eq!(
            login_redirect("/auth", "/dashboard/settings?tab=billing"),
            "/auth?returnTo=%2Fdashboard%2Fsettings%3Ftab%3Dbilling"
        );
    }

    #[test]
    fn return_to_rejects_foreign_targets() {
        assert_eq!(resolve_return_to(Some("/dashboard")), "/dashboard");
        assert_eq!(resolve_return_to(Some("//evil.example.com")), "/");
        assert_eq!(resolve_return_to(Some("https://evil.example.com")), "/");
        assert_eq!(resolve_return_to(None), "/");
    }
}
