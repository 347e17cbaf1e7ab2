use std::fmt;

use tracing_appender::non_blocking::WorkerGuard;

/// Владеет фоновым писателем файлового лога.
///
/// Пока handle жив, события из неблокирующего канала дописываются в файл;
/// при drop буфер сбрасывается.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    pub fn has_file_sink(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Завершает логирование: пишет итоговое событие и сбрасывает буфер.
    pub fn shutdown(mut self) {
        tracing::info!(file_sink = self.has_file_sink(), "Logging shutdown");
        drop(self.file_guard.take());
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_sink", &self.has_file_sink())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_without_file_sink() {
        let handle = LoggingHandle::new(None);
        assert!(!handle.has_file_sink());
        handle.shutdown();
    }

    #[test]
    fn test_shutdown_flushes_file_guard() {
        let (_writer, guard) = tracing_appender::non_blocking(std::io::sink());
        let handle = LoggingHandle::new(Some(guard));
        assert!(handle.has_file_sink());
        assert_eq!(format!("{handle:?}"), "LoggingHandle { file_sink: true }");
        handle.shutdown();
    }
}
