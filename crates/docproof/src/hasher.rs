//! Chunked Hasher: streams file content through SHA-256 in fixed windows.
//!
//! Windows are consumed strictly in order and the task yields to the
//! scheduler after each one, so hashing a large file never holds the
//! executor for the whole read.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use docproof_core::{FileFingerprint, FingerprintHasher, ValidationError};

use crate::config::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE};

/// Progress callback, invoked with a percentage in `0.0..=100.0` after
/// each window. Returning `Err` aborts hashing.
pub type ProgressFn<'a> = &'a mut (dyn FnMut(f64) -> Result<(), String> + Send);

/// Hashes files in fixed-size windows.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedHasher {
    chunk_size: usize,
    max_file_size: u64,
}

impl Default for ChunkedHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_SIZE)
    }
}

impl ChunkedHasher {
    /// A `chunk_size` of zero is treated as one byte.
    pub fn new(chunk_size: usize, max_file_size: u64) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            max_file_size,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Hash a file on disk.
    pub async fn hash_file(
        &self,
        path: impl AsRef<Path>,
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint, ValidationError> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ValidationError::Read(format!("{}: {e}", path.display())))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| ValidationError::Read(format!("{}: {e}", path.display())))?
            .len();
        debug!(path = %path.display(), len, "hashing file");
        self.hash_reader(file, len, progress).await
    }

    /// Hash an in-memory buffer.
    pub async fn hash_bytes(
        &self,
        data: &[u8],
        progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint, ValidationError> {
        self.hash_reader(data, data.len() as u64, progress).await
    }

    /// Hash exactly `total_len` bytes from `reader`.
    ///
    /// A reader that ends before `total_len` bytes, or still has data after
    /// them, fails with [`ValidationError::FileLengthMismatch`].
    pub async fn hash_reader<R>(
        &self,
        mut reader: R,
        total_len: u64,
        mut progress: Option<ProgressFn<'_>>,
    ) -> Result<FileFingerprint, ValidationError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.check_size(total_len)?;

        let mut hasher = FingerprintHasher::new();
        let mut window = vec![0u8; self.chunk_size];

        while hasher.consumed() < total_len {
            let remaining = total_len - hasher.consumed();
            let want = remaining.min(self.chunk_size as u64) as usize;
            let filled = fill_window(&mut reader, &mut window[..want]).await?;
            if filled == 0 {
                return Err(ValidationError::FileLengthMismatch {
                    expected: total_len,
                    actual: hasher.consumed(),
                });
            }
            hasher.update(&window[..filled]);

            if let Some(callback) = progress.as_deref_mut() {
                let percent = (hasher.consumed() as f64 / total_len as f64).min(1.0) * 100.0;
                report(callback, percent)?;
            }

            tokio::task::yield_now().await;
        }

        let mut extra_byte = [0u8; 1];
        let extra = reader
            .read(&mut extra_byte)
            .await
            .map_err(|e| ValidationError::Read(e.to_string()))?;
        if extra > 0 {
            return Err(ValidationError::FileLengthMismatch {
                expected: total_len,
                actual: total_len + extra as u64,
            });
        }

        Ok(hasher.finalize())
    }

    fn check_size(&self, len: u64) -> Result<(), ValidationError> {
        if len == 0 {
            return Err(ValidationError::EmptyFile);
        }
        if len > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size: len,
                max: self.max_file_size,
            });
        }
        Ok(())
    }
}

/// Read until `buf` is full or the reader is exhausted.
async fn fill_window<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, ValidationError>
where
    R: AsyncRead + Unpin + Send,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|e| ValidationError::Read(e.to_string()))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Invoke the progress callback, turning an error or a panic into an abort.
fn report(
    callback: &mut (dyn FnMut(f64) -> Result<(), String> + Send),
    percent: f64,
) -> Result<(), ValidationError> {
    match catch_unwind(AssertUnwindSafe(|| callback(percent))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(ValidationError::ProgressAborted(reason)),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "progress callback panicked".to_string());
            Err(ValidationError::ProgressAborted(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[tokio::test]
    async fn test_known_digest() {
        let fp = ChunkedHasher::new(2, 1024)
            .hash_bytes(b"abc", None)
            .await
            .unwrap();
        assert_eq!(
            fp.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_rejects_empty_and_oversized() {
        let hasher = ChunkedHasher::new(4, 8);
        assert_eq!(
            hasher.hash_bytes(b"", None).await,
            Err(ValidationError::EmptyFile)
        );
        assert_eq!(
            hasher.hash_bytes(&[0u8; 9], None).await,
            Err(ValidationError::FileTooLarge { size: 9, max: 8 })
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let mut seen = Vec::new();
        let mut record = |p: f64| -> Result<(), String> {
            seen.push(p);
            Ok(())
        };
        ChunkedHasher::new(3, 1024)
            .hash_bytes(&[7u8; 10], Some(&mut record))
            .await
            .unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*seen.last().unwrap(), 100.0);
    }

    #[tokio::test]
    async fn test_progress_error_aborts() {
        let mut calls = 0;
        let mut stop = |_p: f64| -> Result<(), String> {
            calls += 1;
            Err("cancelled by user".to_string())
        };
        let result = ChunkedHasher::new(2, 1024)
            .hash_bytes(b"abcdef", Some(&mut stop))
            .await;
        assert_eq!(
            result,
            Err(ValidationError::ProgressAborted("cancelled by user".into()))
        );
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_progress_panic_aborts() {
        let mut boom = |_p: f64| -> Result<(), String> { panic!("boom") };
        let result = ChunkedHasher::new(2, 1024)
            .hash_bytes(b"abcdef", Some(&mut boom))
            .await;
        assert_eq!(result, Err(ValidationError::ProgressAborted("boom".into())));
    }

    #[tokio::test]
    async fn test_short_and_long_readers() {
        let hasher = ChunkedHasher::new(4, 1024);
        let short: &[u8] = b"abc";
        assert_eq!(
            hasher.hash_reader(short, 5, None).await,
            Err(ValidationError::FileLengthMismatch {
                expected: 5,
                actual: 3
            })
        );
        let long: &[u8] = b"abcdef";
        assert!(matches!(
            hasher.hash_reader(long, 4, None).await,
            Err(ValidationError::FileLengthMismatch { expected: 4, .. })
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_yields_between_windows() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                }
            }
        });

        let mut observed = Vec::new();
        let mut record = |_p: f64| -> Result<(), String> {
            observed.push(ticks.load(Ordering::SeqCst));
            Ok(())
        };
        ChunkedHasher::new(4, 1024)
            .hash_bytes(&[1u8; 40], Some(&mut record))
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(observed.len(), 10);
        assert!(
            observed.windows(2).all(|w| w[0] < w[1]),
            "other tasks starved between windows: {observed:?}"
        );
    }

    #[tokio::test]
    async fn test_hash_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        std::fs::write(&path, b"abc").unwrap();

        let fp = ChunkedHasher::default().hash_file(&path, None).await.unwrap();
        assert_eq!(fp, FileFingerprint::of_bytes(b"abc"));

        let missing = ChunkedHasher::default()
            .hash_file(dir.path().join("missing"), None)
            .await;
        assert!(matches!(missing, Err(ValidationError::Read(_))));
    }

    proptest! {
        #[test]
        fn window_size_does_not_change_fingerprint(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            a in 1usize..512,
            b in 1usize..512,
        ) {
            let fa = block_on(ChunkedHasher::new(a, 4096).hash_bytes(&data, None)).unwrap();
            let fb = block_on(ChunkedHasher::new(b, 4096).hash_bytes(&data, None)).unwrap();
            prop_assert_eq!(&fa, &fb);
            prop_assert_eq!(fa, FileFingerprint::of_bytes(&data));
        }
    }
}
