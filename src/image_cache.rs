//! Prompt-keyed image cache. The cache file name is a pure function of the
//! prompt text (16 hex chars of its SHA-256), so the same prompt always
//! maps to the same file and a hit short-circuits generation. Entries are
//! never invalidated.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::IRASUTOYA_STYLE_PREFIX;
use crate::init::IMAGE_CACHE_DIR;

pub fn prompt_hash(prompt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<String>()[..16]
        .to_string()
}

/// Prefix a scene prompt with the house illustration style.
pub fn irasutoya_style(prompt: &str) -> String {
    format!("{}, {}", IRASUTOYA_STYLE_PREFIX, prompt)
}

#[derive(Debug, Clone)]
pub struct ImageCache {
    cache_dir: PathBuf,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(PathBuf::from(IMAGE_CACHE_DIR))
    }
}

impl ImageCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub fn cache_path(&self, prompt: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.png", prompt_hash(prompt)))
    }

    pub async fn exists(&self, prompt: &str) -> bool {
        fs::metadata(self.cache_path(prompt))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Copy a cached image out to `output_path`. Returns false on a miss.
    pub async fn get(&self, prompt: &str, output_path: &Path) -> Result<bool> {
        let cache_path = self.cache_path(prompt);
        if !fs::metadata(&cache_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Ok(false);
        }
        fs::copy(&cache_path, output_path)
            .await
            .with_context(|| format!("cache copy to {}", output_path.display()))?;
        tracing::info!(
            "[cache] hit: {} -> {}",
            cache_path.display(),
            output_path.display()
        );
        Ok(true)
    }

    pub async fn save(&self, prompt: &str, source_path: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir).await.ok();
        let cache_path = self.cache_path(prompt);
        fs::copy(source_path, &cache_path)
            .await
            .with_context(|| format!("cache save to {}", cache_path.display()))?;
        Ok(cache_path)
    }

    /// Fetch from cache or run the generator and remember its result. The
    /// generator receives the prompt and the output path and is invoked at
    /// most once per distinct prompt.
    pub async fn get_or_generate<F, Fut>(
        &self,
        prompt: &str,
        output_path: &Path,
        generate: F,
    ) -> Result<()>
    where
        F: FnOnce(String, PathBuf) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        if self.get(prompt, output_path).await? {
            return Ok(());
        }

        tracing::info!("[cache] miss, generating");
        generate(prompt.to_string(), output_path.to_path_buf()).await?;
        self.save(prompt, output_path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn hash_is_stable_and_short() {
        let a = prompt_hash("piggy bank");
        let b = prompt_hash("piggy bank");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(prompt_hash("piggy bank"), prompt_hash("piggy bank!"));
    }

    #[test]
    fn styled_prompt_keeps_original_text() {
        let styled = irasutoya_style("a salaryman at a desk");
        assert!(styled.starts_with("Irasutoya"));
        assert!(styled.ends_with("a salaryman at a desk"));
    }

    #[tokio::test]
    async fn get_or_generate_runs_generator_once() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path().join("cache"));
        let out1 = dir.path().join("out1.png");
        let out2 = dir.path().join("out2.png");
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        cache
            .get_or_generate("prompt", &out1, |_, path| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::fs::write(&path, b"image-bytes").await?;
                Ok(())
            })
            .await
            .unwrap();

        cache
            .get_or_generate("prompt", &out2, |_, path| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::fs::write(&path, b"different-bytes").await?;
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let a = tokio::fs::read(&out1).await.unwrap();
        let b = tokio::fs::read(&out2).await.unwrap();
        assert_eq!(a, b, "second call must return byte-identical output");
    }
}
