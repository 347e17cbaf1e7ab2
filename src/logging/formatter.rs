use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::Layer,
    registry::LookupSpan,
};

use super::config::{LogFormat, LoggingConfig};

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Строит fmt-слой нужного формата поверх произвольного writer.
///
/// Тип формата стирается в `Box<dyn Layer>`, чтобы консольный и файловый
/// слои можно было собрать в один `Vec`.
pub fn build_layer<S, W>(
    config: &LoggingConfig,
    format: LogFormat,
    with_ansi: bool,
    writer: W,
) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Json => fmt::layer()
            .event_format(fmt::format().json().with_current_span(true))
            .with_writer(writer)
            .with_ansi(false)
            .with_target(config.with_target)
            .with_thread_ids(config.with_thread_ids)
            .with_line_number(config.with_line_numbers)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .event_format(fmt::format().pretty())
            .with_span_events(FmtSpan::CLOSE)
            .with_writer(writer)
            .with_ansi(with_ansi)
            .with_target(config.with_target)
            .with_thread_ids(config.with_thread_ids)
            .with_line_number(config.with_line_numbers)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .event_format(fmt::format().compact())
            .with_writer(writer)
            .with_ansi(with_ansi)
            .with_target(config.with_target)
            .with_thread_ids(config.with_thread_ids)
            .with_line_number(config.with_line_numbers)
            .boxed(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tracing::info;
    use tracing_subscriber::{prelude::*, registry::Registry};

    use super::*;

    /// Буферный writer для тестов.
    #[derive(Clone, Default)]
    pub(crate) struct VecMakeWriter(pub Arc<Mutex<Vec<u8>>>);

    pub(crate) struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    impl io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl VecMakeWriter {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Тест проверяет, что JSON-слой пишет событие одной JSON-строкой.
    #[test]
    fn test_json_layer_output() {
        let writer = VecMakeWriter::default();
        let layer = build_layer::<Registry, _>(
            &LoggingConfig::default(),
            LogFormat::Json,
            false,
            writer.clone(),
        );
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            info!(client = "abc", "client connected");
        });

        let out = writer.contents();
        let line = out.lines().next().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(parsed["fields"]["message"], "client connected");
        assert_eq!(parsed["fields"]["client"], "abc");
    }

    #[test]
    fn test_compact_and_pretty_layers_write() {
        for format in [LogFormat::Compact, LogFormat::Pretty] {
            let writer = VecMakeWriter::default();
            let layer = build_layer::<Registry, _>(
                &LoggingConfig::default(),
                format,
                false,
                writer.clone(),
            );
            tracing::subscriber::with_default(Registry::default().with(layer), || {
                info!("hello from {:?}", format);
            });
            assert!(writer.contents().contains("hello from"));
        }
    }
}
