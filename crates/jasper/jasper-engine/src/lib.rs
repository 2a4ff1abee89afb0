use jasper_config::JasperConfig;
use jasper_host::InProcessHost;
use lithos_fifo::{
    FIFO_CAPACITY, FifoError, FifoFile, FifoModule, ModuleSettings, OpenMode, StartError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start fifo device")]
    Start(#[from] StartError),

    #[error("fifo operation failed")]
    Fifo(#[from] FifoError),

    #[error("client {0} panicked")]
    ClientPanicked(usize),
}

/// Totals for one [`JasperEngine::run`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub clients: usize,
    pub bytes_written: usize,
    /// Part of `bytes_written` that came from write-only clients, which never
    /// see their own bytes.
    pub write_only_bytes_written: usize,
    pub bytes_read: usize,
    /// Writes that were turned away because some ring was full.
    pub rejected_writes: usize,
}

#[derive(Debug, Default)]
struct ClientReport {
    mode: Option<OpenMode>,
    written: usize,
    read: usize,
    rejected: usize,
}

/// Counts a client as writing until dropped, so an early `?` still releases
/// the clients that wait for the last writer.
struct Writing<'a>(&'a AtomicUsize);

impl Drop for Writing<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

pub struct JasperEngine {
    pub config: JasperConfig,
    module: FifoModule<InProcessHost>,
}

impl JasperEngine {
    pub fn new(config: JasperConfig) -> Result<Self, EngineError> {
        let settings = ModuleSettings {
            device_name: config.device_name.clone(),
            node_prefix: config.node_prefix.clone(),
            handle_budget: config.handle_budget,
        };
        let module = FifoModule::start(InProcessHost::new(), &settings)?;
        Ok(JasperEngine { config, module })
    }

    pub fn node_name(&self) -> &str {
        self.module.node_name()
    }

    fn mode_for(&self, client: usize) -> OpenMode {
        let every = self.config.workload.write_only_every;
        if every != 0 && (client + 1) % every == 0 {
            OpenMode::WriteOnly
        } else {
            OpenMode::ReadWrite
        }
    }

    /// Opens the configured clients, runs them concurrently and closes them.
    pub fn run(&self) -> Result<RunReport, EngineError> {
        let workload = &self.config.workload;
        let files = (0..workload.clients)
            .map(|i| self.module.open(self.mode_for(i)))
            .collect::<Result<Vec<_>, _>>()?;
        info!(
            node = self.node_name(),
            clients = files.len(),
            rounds = workload.rounds,
            "starting fifo workload"
        );

        let writing = AtomicUsize::new(files.len());
        let results = std::thread::scope(|s| {
            let handles: Vec<_> = files
                .iter()
                .map(|file| {
                    let writing = &writing;
                    s.spawn(move || self.drive(file, writing))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(i, h)| h.join().map_err(|_| EngineError::ClientPanicked(i)))
                .collect::<Vec<_>>()
        });

        let mut report = RunReport {
            clients: files.len(),
            ..RunReport::default()
        };
        for result in results {
            let client = result??;
            report.bytes_written += client.written;
            if client.mode == Some(OpenMode::WriteOnly) {
                report.write_only_bytes_written += client.written;
            }
            report.bytes_read += client.read;
            report.rejected_writes += client.rejected;
        }
        drop(files);

        info!(?report, "fifo workload finished");
        Ok(report)
    }

    fn drive(
        &self,
        file: &FifoFile<'_>,
        writing: &AtomicUsize,
    ) -> Result<ClientReport, FifoError> {
        let payload = self.config.workload.payload.as_bytes();
        let mut sink = [0u8; FIFO_CAPACITY];
        let mut report = ClientReport {
            mode: Some(file.mode()),
            ..ClientReport::default()
        };

        let guard = Writing(writing);
        for _ in 0..self.config.workload.rounds {
            match file.write(payload)? {
                0 => {
                    report.rejected += 1;
                    std::thread::yield_now();
                }
                n => report.written += n,
            }
            report.read += file.read(&mut sink)?;
        }
        drop(guard);

        // One undrained ring blocks every writer, so keep reading while
        // anyone still writes.
        while writing.load(Ordering::Acquire) > 0 {
            match file.read(&mut sink)? {
                0 => std::thread::yield_now(),
                n => report.read += n,
            }
        }
        loop {
            match file.read(&mut sink)? {
                0 => break,
                n => report.read += n,
            }
        }

        debug!(handle = %file.id(), ?report, "client finished");
        Ok(report)
    }

    /// Unregisters the device.
    pub fn shutdown(self) {
        self.module.stop();
    }
}
