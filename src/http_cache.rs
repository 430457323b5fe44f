use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "prono_desk";
const CACHE_FILE: &str = "http_cache.json";
const MAX_ENTRIES: usize = 512;

static CACHE: Mutex<Option<HttpCacheFile>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    fetched_at: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: u64, ttl: Duration) -> bool {
        now.saturating_sub(self.fetched_at) < ttl.as_secs()
    }
}

/// GET `url`, memoized for `ttl`. Header values never form part of the cache key,
/// so credentials can be passed in `extra_headers`.
///
/// `validate` vets a 200 body before it is cached; a rejected body is never stored.
/// When the upstream is unreachable, rate-limited (429 or a rejected body) or
/// failing (5xx), a stale cached body is returned instead of an error.
pub fn fetch_json_cached(
    client: &Client,
    url: &str,
    extra_headers: &[(&str, &str)],
    ttl: Duration,
    validate: impl Fn(&str) -> Result<()>,
) -> Result<String> {
    let now = now_secs();
    let cached_entry = {
        let mut guard = CACHE.lock().expect("http cache lock poisoned");
        let cache = guard.get_or_insert_with(load_cache_file);
        cache.entries.get(url).cloned()
    };

    if let Some(entry) = cached_entry.as_ref() {
        if entry.is_fresh(now, ttl) {
            debug!(url, "http cache hit");
            return Ok(entry.body.clone());
        }
    }

    let mut req = client.get(url);
    for (name, value) in extra_headers {
        req = req.header(*name, *value);
    }

    let resp = match req.send() {
        Ok(resp) => resp,
        Err(err) => {
            if let Some(entry) = cached_entry {
                warn!(url, error = %err, "request failed, serving stale cache");
                return Ok(entry.body);
            }
            return Err(err).context("request failed");
        }
    };

    let status = resp.status();
    let body = resp.text().context("failed reading body")?;
    match resolve_response(url, status, body, cached_entry, &validate)? {
        Resolved::Fetched(body) => {
            store_cache_entry(
                url,
                CacheEntry {
                    body: body.clone(),
                    fetched_at: now,
                },
            );
            Ok(body)
        }
        Resolved::Stale(body) => Ok(body),
    }
}

#[derive(Debug, PartialEq)]
enum Resolved {
    Fetched(String),
    Stale(String),
}

fn resolve_response(
    url: &str,
    status: StatusCode,
    body: String,
    stale: Option<CacheEntry>,
    validate: &dyn Fn(&str) -> Result<()>,
) -> Result<Resolved> {
    if !status.is_success() {
        let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
        if retryable {
            if let Some(entry) = stale {
                warn!(url, %status, "upstream unavailable, serving stale cache");
                return Ok(Resolved::Stale(entry.body));
            }
        }
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }

    match validate(&body) {
        Ok(()) => Ok(Resolved::Fetched(body)),
        Err(err) => match stale {
            Some(entry) => {
                warn!(url, error = %format!("{err:#}"), "upstream rejected request, serving stale cache");
                Ok(Resolved::Stale(entry.body))
            }
            None => Err(err),
        },
    }
}

fn store_cache_entry(key: &str, entry: CacheEntry) {
    let mut guard = CACHE.lock().expect("http cache lock poisoned");
    let cache = guard.get_or_insert_with(load_cache_file);
    cache.version = CACHE_VERSION;
    cache.entries.insert(key.to_string(), entry);
    evict_oldest(cache);
    if let Err(err) = save_cache_file(cache) {
        warn!(error = %err, "failed to persist http cache");
    }
}

fn evict_oldest(cache: &mut HttpCacheFile) {
    while cache.entries.len() > MAX_ENTRIES {
        let oldest = cache
            .entries
            .iter()
            .min_by_key(|(_, e)| e.fetched_at)
            .map(|(k, _)| k.clone());
        match oldest {
            Some(key) => {
                cache.entries.remove(&key);
            }
            None => break,
        }
    }
}

fn load_cache_file() -> HttpCacheFile {
    let Some(path) = cache_path() else {
        return HttpCacheFile::default();
    };
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(cache: &HttpCacheFile) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    let Some(dir) = path.parent() else {
        return Ok(());
    };
    fs::create_dir_all(dir).ok();
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, &path).context("swap http cache")?;
    Ok(())
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fetched_at: u64) -> CacheEntry {
        CacheEntry {
            body: "{}".to_string(),
            fetched_at,
        }
    }

    #[test]
    fn freshness_respects_ttl() {
        let ttl = Duration::from_secs(60);
        assert!(entry(1_000).is_fresh(1_059, ttl));
        assert!(!entry(1_000).is_fresh(1_060, ttl));
        // Clock skew backwards counts as fresh rather than underflowing.
        assert!(entry(2_000).is_fresh(1_000, ttl));
    }

    fn reject_errors(body: &str) -> Result<()> {
        crate::api_football::check_envelope(body)
    }

    const GOOD: &str = r#"{"errors":[],"response":[{"team":{"id":80,"name":"Lyon"}}]}"#;
    const RATE_LIMITED: &str =
        r#"{"errors":{"requests":"You have reached the request limit for the day"},"response":[]}"#;

    fn stale_good() -> Option<CacheEntry> {
        Some(CacheEntry {
            body: GOOD.to_string(),
            fetched_at: 0,
        })
    }

    #[test]
    fn rejected_ok_body_serves_stale_entry() {
        let resolved = resolve_response(
            "u",
            StatusCode::OK,
            RATE_LIMITED.to_string(),
            stale_good(),
            &reject_errors,
        )
        .expect("stale body should be served");
        assert_eq!(resolved, Resolved::Stale(GOOD.to_string()));
    }

    #[test]
    fn rejected_ok_body_without_stale_is_an_error() {
        let err = resolve_response(
            "u",
            StatusCode::OK,
            RATE_LIMITED.to_string(),
            None,
            &reject_errors,
        )
        .expect_err("error envelope should fail");
        assert!(format!("{err:#}").contains("request limit"));
    }

    #[test]
    fn valid_body_replaces_stale_entry() {
        let fresh = r#"{"errors":[],"response":[]}"#;
        let resolved = resolve_response(
            "u",
            StatusCode::OK,
            fresh.to_string(),
            stale_good(),
            &reject_errors,
        )
        .expect("valid body");
        assert_eq!(resolved, Resolved::Fetched(fresh.to_string()));
    }

    #[test]
    fn rate_limit_status_serves_stale_but_client_errors_do_not() {
        let resolved = resolve_response(
            "u",
            StatusCode::TOO_MANY_REQUESTS,
            String::new(),
            stale_good(),
            &reject_errors,
        )
        .expect("429 with stale entry");
        assert_eq!(resolved, Resolved::Stale(GOOD.to_string()));

        assert!(
            resolve_response(
                "u",
                StatusCode::FORBIDDEN,
                String::new(),
                stale_good(),
                &reject_errors,
            )
            .is_err()
        );
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let mut cache = HttpCacheFile::default();
        for i in 0..(MAX_ENTRIES + 3) {
            cache.entries.insert(format!("k{i}"), entry(i as u64));
        }
        evict_oldest(&mut cache);
        assert_eq!(cache.entries.len(), MAX_ENTRIES);
        assert!(!cache.entries.contains_key("k0"));
        assert!(!cache.entries.contains_key("k2"));
        assert!(cache.entries.contains_key("k3"));
    }
}
