use std::{path::Path, time::Duration};

use color_eyre::{
    eyre::{eyre, Result, WrapErr},
    owo_colors::OwoColorize,
};

use crate::{
    action::{self, Action, ActionReceiver, ActionSender},
    cli::{Command, ScanArgs},
    config::{Config, ScanSettings},
    enumerator::{InterfaceEnumerator, InterfaceListing},
    enums::SectionKind,
    orchestrator::ScanOrchestrator,
    phase::ScanPhase,
    privilege,
    report::{categorize, Report},
    snapshot::{extract, Snapshot},
};

/// Drives the core from the command line: every update arrives as an [`Action`]
/// and is rendered here.
pub struct App {
    pub config: Config,
    pub settings: ScanSettings,
    pub action_tx: ActionSender,
    pub action_rx: ActionReceiver,
    pub snapshot: Option<Snapshot>,
    pub quiet: bool,
    pub plain: bool,
}

impl App {
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = Config::new(config_path).wrap_err("failed to load configuration")?;
        let settings = config.scanner.resolve();
        let (action_tx, action_rx) = action::channel();
        Ok(Self {
            config,
            settings,
            action_tx,
            action_rx,
            snapshot: None,
            quiet: false,
            plain: false,
        })
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Interfaces => {
                warn_if_unprivileged();
                self.list_interfaces().await
            }
            Command::Scan(args) => {
                warn_if_unprivileged();
                self.scan(args).await
            }
            Command::Report { path } => self.report(&path),
        }
    }

    async fn list_interfaces(&mut self) -> Result<()> {
        let mut enumerator = InterfaceEnumerator::new(self.settings.clone());
        enumerator.register_action_handler(self.action_tx.clone());
        enumerator.spawn();

        while let Some(action) = self.action_rx.recv().await {
            if let Action::InterfacesListed(listing) = action {
                print_listing(&listing);
                return Ok(());
            }
        }
        Err(eyre!("interface enumeration ended without a result"))
    }

    async fn scan(&mut self, args: ScanArgs) -> Result<()> {
        self.quiet = args.quiet;
        self.plain = args.plain;

        let mut orchestrator = ScanOrchestrator::new(self.settings.clone());
        orchestrator.register_action_handler(self.action_tx.clone());
        let task = orchestrator.spawn_scan(args.interface);

        if let Some(secs) = args.timeout {
            let cancel = task.cancel_token();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                if !cancel.is_cancelled() {
                    log::warn!("Scan exceeded {}s, cancelling", secs);
                    cancel.cancel();
                }
            });
        }

        let mut failure = None;
        while let Some(action) = self.action_rx.recv().await {
            match action {
                Action::ScanComplete { interface } => {
                    log::info!("Scan of {} complete", interface);
                    break;
                }
                Action::ScanFailed { kind, message } => {
                    failure = Some(eyre!("{}: {}", kind, message));
                    break;
                }
                action => self.update(action),
            }
        }
        if let Some(e) = failure {
            // The task has already reported; reap it before bailing.
            let _ = task.join().await;
            return Err(e);
        }

        let outcome = task.join().await?;
        let snapshot = self.snapshot.take().unwrap_or_default();
        print_report(&categorize(&snapshot, &outcome.raw_output), &args.sections);
        Ok(())
    }

    fn report(&self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path).wrap_err_with(|| format!("cannot read {}", path.display()))?;
        let snapshot = extract(&raw, &self.settings.windows);
        print_report(&categorize(&snapshot, ""), &[]);
        Ok(())
    }

    fn update(&mut self, action: Action) {
        log::debug!("{action:?}");
        match action {
            Action::PhaseChanged(phase) => {
                if !self.quiet {
                    eprintln!("{} {}", "==>".cyan(), phase_label(phase));
                }
            }
            Action::CollectorLine(line) => self.print_line("collector", &line),
            Action::EngineLine(line) => self.print_line("engine", &line),
            Action::SnapshotReady(path) => match std::fs::read_to_string(&path) {
                Ok(raw) => self.snapshot = Some(extract(&raw, &self.settings.windows)),
                Err(e) => log::error!("Snapshot {} vanished before extraction: {}", path.display(), e),
            },
            Action::InterfacesListed(listing) => print_listing(&listing),
            Action::ScanComplete { .. } | Action::ScanFailed { .. } => {}
        }
    }

    fn print_line(&self, source: &str, line: &str) {
        if self.quiet {
            return;
        }
        if self.plain {
            println!("{} | {}", source, strip_ansi_escapes::strip_str(line));
        } else {
            println!("{} | {}", source.dimmed(), line);
        }
    }
}

fn phase_label(phase: ScanPhase) -> &'static str {
    match phase {
        ScanPhase::Idle => "Idle",
        ScanPhase::CollectorRunning => "Collecting host state",
        ScanPhase::CollectorDone => "Collector finished",
        ScanPhase::EngineRunning => "Analyzing snapshot",
        ScanPhase::EngineDone => "Analysis finished",
        ScanPhase::Error => "Scan failed",
    }
}

fn warn_if_unprivileged() {
    if !privilege::is_elevated() {
        eprintln!("{}\n", privilege::privilege_warning());
    }
}

fn print_listing(listing: &InterfaceListing) {
    if let Some(warning) = &listing.warning {
        eprintln!("{} {}: {}", "warning:".yellow(), warning.kind(), warning);
    }
    for choice in listing.display_strings() {
        println!("{}", choice);
    }
}

fn print_report(report: &Report, only: &[SectionKind]) {
    for section in report.sections() {
        if !only.is_empty() && !only.contains(&section.kind) {
            continue;
        }
        println!("{}", format!("===== {} =====", section.title()).bold());
        println!("{}", section.body);
    }
}
