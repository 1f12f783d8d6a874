//! Browser Launcher
//!
//! Handles Chrome discovery, launch flags, and the throwaway profile
//! directory each instance runs in.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cdp::{Connection, Transport};
use crate::config::BrowserConfig;
use crate::error::{Error, Result};
use crate::page::Page;

/// Global counter for unique user data directories
static BROWSER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Environment variable that overrides Chrome discovery
pub const CHROME_PATH_ENV: &str = "CHROME_PATH";

fn chrome_args(config: &BrowserConfig, user_data_dir: &Path) -> Vec<String> {
    let mut args = vec![
        "--disable-infobars".into(),
        "--disable-dev-shm-usage".into(),
        "--disable-renderer-backgrounding".into(),
        "--disable-background-timer-throttling".into(),
        "--disable-backgrounding-occluded-windows".into(),
        "--no-first-run".into(),
        "--no-default-browser-check".into(),
        "--disable-default-apps".into(),
        "--disable-popup-blocking".into(),
        "--disable-sync".into(),
        "--disable-translate".into(),
        "--password-store=basic".into(),
        "--use-mock-keychain".into(),
        "--remote-debugging-port=0".into(),
        format!(
            "--window-size={},{}",
            config.viewport_width, config.viewport_height
        ),
        format!("--user-data-dir={}", user_data_dir.display()),
    ];

    if config.headless {
        args.push("--headless=new".into());
    }

    args
}

#[cfg(target_os = "macos")]
const CHROME_CANDIDATES: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Google Chrome Canary.app/Contents/MacOS/Google Chrome Canary",
];

#[cfg(target_os = "linux")]
const CHROME_CANDIDATES: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

#[cfg(target_os = "windows")]
const CHROME_CANDIDATES: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
];

#[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
const CHROME_CANDIDATES: &[&str] = &[];

/// Locate Chrome: explicit path, then `CHROME_PATH`, then well-known installs
pub fn find_chrome(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(Error::Launch(format!("Chrome binary not found: {:?}", path)))
        };
    }

    if let Some(path) = std::env::var_os(CHROME_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points to a missing file: {:?}", CHROME_PATH_ENV, path);
    }

    CHROME_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .ok_or(Error::ChromeNotFound)
}

/// Spawn Chrome and read the DevTools URL it prints on stderr
fn spawn_chrome(path: &Path, args: &[String]) -> Result<(Child, String)> {
    let mut child = Command::new(path)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Launch(format!("Failed to launch Chrome: {}", e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or(Error::Launch("No stderr from Chrome".into()))?;

    // Chrome prints: DevTools listening on ws://127.0.0.1:PORT/devtools/browser/GUID
    let ws_url = BufReader::new(stderr)
        .lines()
        .map_while(|line| line.ok())
        .inspect(|line| tracing::trace!("Chrome stderr: {}", line))
        .find_map(|line| {
            let start = line.find("ws://")?;
            line.contains("DevTools listening on")
                .then(|| line[start..].trim().to_string())
        });

    match ws_url {
        Some(url) => {
            tracing::debug!("Chrome DevTools URL: {}", url);
            Ok((child, url))
        }
        None => {
            let _ = child.kill();
            Err(Error::Launch(
                "Failed to get DevTools WebSocket URL from Chrome".into(),
            ))
        }
    }
}

/// A running Chrome instance
pub struct Browser {
    connection: Connection,
    config: Arc<BrowserConfig>,
    /// User data directory (cleaned up on close)
    user_data_dir: PathBuf,
}

impl Browser {
    /// Launch Chrome with the given config
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let config = Arc::new(config.clone());

        let instance_id = BROWSER_COUNTER.fetch_add(1, Ordering::Relaxed);
        let user_data_dir = std::env::temp_dir().join(format!(
            "orderbot-chrome-{}-{}",
            std::process::id(),
            instance_id
        ));
        let _ = std::fs::remove_dir_all(&user_data_dir);
        std::fs::create_dir_all(&user_data_dir)?;

        let chrome_path = find_chrome(config.chrome_path.as_deref())?;
        let args = chrome_args(&config, &user_data_dir);

        tracing::info!("Launching Chrome from {:?}", chrome_path);
        let (child, ws_url) = spawn_chrome(&chrome_path, &args)?;
        let connection = Connection::new(Transport::connect(child, &ws_url)?);

        let version = connection.version().await?;
        tracing::info!("Connected to Chrome: {}", version.product);

        Ok(Self {
            connection,
            config,
            user_data_dir,
        })
    }

    /// Open a new tab and navigate it to `url`
    pub async fn new_page(&self, url: &str) -> Result<Page> {
        let session = self.connection.open_page("about:blank").await?;
        session.page_enable().await?;

        let page = Page::new(session, Arc::clone(&self.config));
        page.goto(url).await?;
        Ok(page)
    }

    /// Get the browser version
    pub async fn version(&self) -> Result<String> {
        Ok(self.connection.version().await?.product)
    }

    /// Close the browser
    pub async fn close(self) -> Result<()> {
        self.connection.close().await?;
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
        Ok(())
    }
}

impl Drop for Browser {
    fn drop(&mut self) {
        // The Transport's Drop impl kills Chrome if close() wasn't called
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_and_viewport_flags() {
        let config = BrowserConfig {
            headless: true,
            viewport_width: 1024,
            viewport_height: 768,
            ..Default::default()
        };
        let args = chrome_args(&config, Path::new("/tmp/profile"));
        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--window-size=1024,768".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(args.contains(&"--remote-debugging-port=0".to_string()));

        let headed = chrome_args(&BrowserConfig::default(), Path::new("/tmp/p"));
        assert!(!headed.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_no_automation_masking_flags() {
        let args = chrome_args(&BrowserConfig::default(), Path::new("/tmp/p"));
        assert!(!args.iter().any(|a| a.contains("AutomationControlled")));
        assert!(!args.contains(&"--disable-automation".to_string()));
    }

    #[test]
    fn test_configured_path_must_exist() {
        let err = find_chrome(Some(Path::new("/nonexistent/chrome"))).unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }

    #[test]
    fn test_configured_path_is_used() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(find_chrome(Some(file.path())).unwrap(), file.path());
    }
}
