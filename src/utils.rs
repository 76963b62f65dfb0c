use rand::{distributions::Alphanumeric, thread_rng, Rng};
use std::path::PathBuf;
use url::Url;

pub const DEFAULT_CACHE_PATH: &str = "data/banners.json";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

lazy_static! {
    pub static ref DEFAULT_CHROME_PATH: Option<PathBuf> = {
        let candidate = if cfg!(target_os = "macos") {
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"
        } else if cfg!(target_os = "windows") {
            r"C:\Program Files\Google\Chrome\Application\chrome.exe"
        } else {
            // headless_chrome looks through PATH on its own
            return None;
        };
        let path = PathBuf::from(candidate);
        if path.exists() {
            Some(path)
        } else {
            None
        }
    };
}

/// Base identity of an image: the URL without query string or fragment.
pub fn strip_query(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut u) => {
            u.set_query(None);
            u.set_fragment(None);
            u.to_string()
        }
        Err(_) => url
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

pub fn is_absolute_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Font and stylesheet requests, judged by URL shape only.
pub fn is_decorative_asset(url: &str) -> bool {
    let base = strip_query(url).to_lowercase();
    const EXTENSIONS: [&str; 6] = [".css", ".woff", ".woff2", ".ttf", ".otf", ".eot"];
    EXTENSIONS.iter().any(|ext| base.ends_with(ext))
        || base.starts_with("https://fonts.googleapis.com/")
        || base.starts_with("https://fonts.gstatic.com/")
}

pub fn get_random_string(len: i32) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len as usize)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_query_and_fragment() {
        assert_eq!(
            strip_query("https://cdn.example.com/img/a.jpg?v=123&w=800#x"),
            "https://cdn.example.com/img/a.jpg"
        );
        assert_eq!(
            strip_query("https://cdn.example.com/img/a.jpg?v=1"),
            strip_query("https://cdn.example.com/img/a.jpg?v=2")
        );
    }

    #[test]
    fn strips_relative_urls_too() {
        assert_eq!(strip_query("/img/a.jpg?cache=9"), "/img/a.jpg");
        assert_eq!(strip_query("a.jpg"), "a.jpg");
    }

    #[test]
    fn absolute_urls() {
        assert!(is_absolute_url("https://cdn.example.com/a.jpg"));
        assert!(is_absolute_url("http://cdn.example.com/a.jpg"));
        assert!(!is_absolute_url("/a.jpg"));
        assert!(!is_absolute_url("data:image/png;base64,AAAA"));
        assert!(!is_absolute_url(""));
    }

    #[test]
    fn decorative_assets() {
        assert!(is_decorative_asset("https://site.example.com/app.css?v=3"));
        assert!(is_decorative_asset("https://fonts.gstatic.com/s/roboto/x"));
        assert!(is_decorative_asset("https://site.example.com/f/Inter.WOFF2"));
        assert!(!is_decorative_asset("https://site.example.com/app.js"));
        assert!(!is_decorative_asset("https://cdn.example.com/banner.jpg"));
        assert!(!is_decorative_asset("https://site.example.com/menu"));
    }

    #[test]
    fn random_string_length() {
        let s = get_random_string(11);
        assert_eq!(s.len(), 11);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
