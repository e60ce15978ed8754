//! Generated sitemap document cache.
//!
//! Holds at most one rendered document and its generation time.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::{CacheStats, StatsCounter};
use crate::error::Result;
use crate::source::{SitemapSource, SitemapUrl};

#[derive(Debug, Clone)]
struct SitemapDocument {
    bytes: Arc<Vec<u8>>,
    built_at: Instant,
    generated_at: DateTime<Utc>,
}

// == Sitemap Cache ==
/// The rendered sitemap document, regenerated once it is older than its TTL.
pub struct SitemapCache {
    source: Arc<dyn SitemapSource>,
    base_url: String,
    ttl: Duration,
    document: RwLock<Option<SitemapDocument>>,
    stats: StatsCounter,
    items: AtomicUsize,
}

impl SitemapCache {
    /// `base_url` prefixes every relative location in the document.
    pub fn new(source: Arc<dyn SitemapSource>, base_url: impl Into<String>, ttl: Duration) -> Self {
        Self {
            source,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ttl,
            document: RwLock::new(None),
            stats: StatsCounter::new(),
            items: AtomicUsize::new(0),
        }
    }

    fn fresh(&self, document: &Option<SitemapDocument>) -> Option<Arc<Vec<u8>>> {
        document
            .as_ref()
            .filter(|doc| doc.built_at.elapsed() < self.ttl)
            .map(|doc| Arc::clone(&doc.bytes))
    }

    /// The sitemap XML, regenerated if absent or older than the TTL.
    pub async fn get(&self) -> Result<Arc<Vec<u8>>> {
        if let Some(bytes) = self.fresh(&*self.document.read().await) {
            self.stats.record_hit();
            return Ok(bytes);
        }

        let mut document = self.document.write().await;
        if let Some(bytes) = self.fresh(&document) {
            self.stats.record_hit();
            return Ok(bytes);
        }

        self.stats.record_miss();
        let urls = self.collect_urls().await?;
        let bytes = Arc::new(render(&self.base_url, &urls).into_bytes());
        *document = Some(SitemapDocument {
            bytes: Arc::clone(&bytes),
            built_at: Instant::now(),
            generated_at: Utc::now(),
        });
        self.items.store(1, Ordering::Relaxed);
        self.stats.record_set();
        info!(urls = urls.len(), bytes = bytes.len(), "Sitemap regenerated");
        Ok(bytes)
    }

    async fn collect_urls(&self) -> Result<Vec<SitemapUrl>> {
        let mut urls = self.source.homepage().await?;
        urls.extend(self.source.published_pages().await?);
        urls.extend(self.source.categories().await?);
        urls.extend(self.source.tags().await?);
        Ok(urls)
    }

    /// When the cached document was generated, if one is cached.
    pub async fn generated_at(&self) -> Option<DateTime<Utc>> {
        self.document.read().await.as_ref().map(|doc| doc.generated_at)
    }

    // == Invalidation ==

    /// Discards the document regardless of its age.
    pub async fn invalidate(&self) {
        *self.document.write().await = None;
        self.items.store(0, Ordering::Relaxed);
        debug!("Sitemap invalidated");
    }

    // == Introspection ==

    /// Hit/miss/set counters; items is 1 while a document is cached.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.items.load(Ordering::Relaxed))
    }

    /// Zeroes the counters and records the reset time.
    pub fn reset_stats(&self) {
        self.stats.reset();
    }
}

/// Renders a sitemaps.org 0.9 `urlset`.
fn render(base_url: &str, urls: &[SitemapUrl]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for url in urls {
        let loc = if url.loc.starts_with("http://") || url.loc.starts_with("https://") {
            url.loc.clone()
        } else {
            format!("{}/{}", base_url, url.loc.trim_start_matches('/'))
        };
        xml.push_str("  <url>\n");
        let _ = writeln!(xml, "    <loc>{}</loc>", escape_xml(&loc));
        if let Some(lastmod) = url.lastmod {
            let _ = writeln!(xml, "    <lastmod>{}</lastmod>", lastmod.format("%Y-%m-%d"));
        }
        if let Some(changefreq) = &url.changefreq {
            let _ = writeln!(xml, "    <changefreq>{}</changefreq>", escape_xml(changefreq));
        }
        if let Some(priority) = url.priority {
            let _ = writeln!(xml, "    <priority>{:.1}</priority>", priority.clamp(0.0, 1.0));
        }
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ContentData, InMemorySource, Page, StoredPage};

    fn source() -> Arc<InMemorySource> {
        Arc::new(InMemorySource::new(ContentData {
            pages: vec![StoredPage {
                page: Page {
                    id: 1,
                    slug: "about".to_string(),
                    title: "About".to_string(),
                    body: String::new(),
                    language_code: "en".to_string(),
                    updated_at: None,
                },
                published: true,
                visible_to: Vec::new(),
            }],
            categories: vec!["news".to_string()],
            tags: vec!["rust&go".to_string()],
            ..ContentData::default()
        }))
    }

    #[tokio::test]
    async fn test_document_contents() {
        let cache = SitemapCache::new(source(), "https://example.com/", Duration::from_secs(60));
        let bytes = cache.get().await.unwrap();
        let xml = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://example.com/</loc>"));
        assert!(xml.contains("<loc>https://example.com/en/about</loc>"));
        assert!(xml.contains("<loc>https://example.com/category/news</loc>"));
        assert!(xml.contains("<loc>https://example.com/tag/rust&amp;go</loc>"));
        assert!(xml.contains("<priority>1.0</priority>"));
        assert!(cache.generated_at().await.is_some());
    }

    #[tokio::test]
    async fn test_cached_until_invalidated() {
        let source = source();
        let cache = SitemapCache::new(source.clone(), "https://example.com", Duration::from_secs(60));

        cache.get().await.unwrap();
        let calls = source.calls().sitemap;
        assert_eq!(calls, 4);

        cache.get().await.unwrap();
        assert_eq!(source.calls().sitemap, calls);

        cache.invalidate().await;
        assert!(cache.generated_at().await.is_none());
        cache.get().await.unwrap();
        assert_eq!(source.calls().sitemap, calls * 2);
    }

    #[tokio::test]
    async fn test_regenerates_after_ttl() {
        let source = source();
        let cache = SitemapCache::new(source.clone(), "https://example.com", Duration::from_millis(30));

        cache.get().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.get().await.unwrap();

        assert_eq!(source.calls().sitemap, 8);
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.sets), (0, 2, 2));
    }

    #[tokio::test]
    async fn test_failure_keeps_nothing() {
        let source = source();
        let cache = SitemapCache::new(source.clone(), "https://example.com", Duration::from_secs(60));
        source.set_failing(true);

        assert!(cache.get().await.is_err());
        assert!(cache.generated_at().await.is_none());
    }
}
