use std::io::{self, BufRead, Write};
use std::sync::mpsc;

use anyhow::{Result, bail};
use crossterm::style::Stylize;

use tether::model::config::AppConfig;
use tether::model::package_root::PackageRoot;
use tether::msg::{Level, Msg, Notice, Notifier};
use tether::plugin::PluginManager;
use tether::plugin::host::RuntimePath;
use tether::plugin::lock::LockStore;
use tether::plugin::manager::BatchReport;
use tether::plugin::spec::{Pinning, SpecEntry};
use tether::plugin::status::{StatusView, short_hash};

const HELP: &[&str] = &[
    "usage: tether <command> [args]",
    "",
    "  sync                     install missing plugins and load everything",
    "  update [names..]         fetch and move plugins to their pinned target",
    "  restore [names..]        check out the locked commit",
    "  lock [names..]           record the current commit in the lockfile",
    "  check [names..]          list new upstream commits without moving",
    "  delete <name> [--yes]    remove a plugin directory (alias: rm)",
    "  clean-lock               drop lock entries of unregistered plugins",
    "  status                   show pin and lock drift (alias: st)",
    "  list                     list registered plugins (alias: ls)",
    "  help",
];

/// Command-line presentation client over the plugin manager.
pub struct App {
    manager: PluginManager,
    specs: Vec<SpecEntry>,
    events: mpsc::Receiver<Msg>,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let (tx, events) = mpsc::channel::<Msg>();
        let lock = LockStore::load(config.lockfile_path());
        let manager = PluginManager::new(
            PackageRoot::new(config.package_root()),
            lock,
            Box::new(RuntimePath::default()),
            Notifier::new(tx),
        );

        Self {
            manager,
            specs: config.plugins,
            events,
        }
    }

    pub fn run(&mut self, args: &[String]) -> Result<()> {
        let Some((command, rest)) = args.split_first() else {
            print_lines(HELP);
            return Ok(());
        };

        match command.as_str() {
            "sync" => {
                self.manager.setup(self.specs.clone());
            }
            "update" | "up" => {
                self.manager.register(self.specs.clone());
                let report = self.manager.update(rest);
                self.print_report(&report);
            }
            "restore" => {
                self.manager.register(self.specs.clone());
                let report = self.manager.restore(rest);
                self.print_report(&report);
            }
            "lock" => {
                self.manager.register(self.specs.clone());
                let report = self.manager.lock(rest);
                self.print_report(&report);
            }
            "check" => {
                self.manager.register(self.specs.clone());
                self.check(rest);
            }
            "delete" | "rm" => {
                self.manager.register(self.specs.clone());
                self.delete(rest)?;
            }
            "clean-lock" => {
                self.manager.register(self.specs.clone());
                let removed = self.manager.clean_lock()?;
                self.drain();
                println!("{removed} lock entries removed");
            }
            "status" | "st" => {
                self.manager.register(self.specs.clone());
                let view = self.manager.status_view();
                self.drain();
                print_status(&view);
            }
            "list" | "ls" => {
                self.manager.register(self.specs.clone());
                self.list();
            }
            "help" | "-h" | "--help" => print_lines(HELP),
            other => bail!("unknown command: {other} (try `tether help`)"),
        }

        self.drain();
        Ok(())
    }

    fn check(&mut self, names: &[String]) {
        let (report, handles) = self.manager.check_updates(names);
        for issue in &report.issues {
            println!("{} {issue}", "SKIP".yellow());
        }

        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("new-commit query thread panicked");
            }
        }

        let mut results: Vec<(String, Result<Vec<String>, String>)> = Vec::new();
        for msg in self.events.try_iter() {
            match msg {
                Msg::NewCommits { name, lines } => results.push((name, lines)),
                Msg::Notify(notice) => print_notice(&notice),
            }
        }

        results.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, lines) in results {
            println!("{}", name.bold());
            match lines {
                Ok(lines) => {
                    for line in lines {
                        println!("  {line}");
                    }
                }
                Err(err) => println!("  {}", err.red()),
            }
        }
    }

    fn delete(&mut self, args: &[String]) -> Result<()> {
        let assume_yes = args.iter().any(|arg| arg == "--yes" || arg == "-y");
        let Some(name) = args.iter().find(|arg| !arg.starts_with('-')) else {
            bail!("usage: tether delete <name> [--yes]");
        };

        if !assume_yes && !confirm(&format!("delete {name}?"))? {
            println!("aborted");
            return Ok(());
        }

        if let Err(err) = self.manager.delete(name) {
            self.drain();
            bail!(err);
        }
        Ok(())
    }

    fn list(&self) {
        let plugins = self.manager.list_plugins();
        if plugins.is_empty() {
            println!("plugins: none configured");
            return;
        }

        for plugin in plugins {
            let pin = match &plugin.pinning {
                Pinning::None => String::new(),
                Pinning::Branch(branch) => format!(" branch={branch}"),
                Pinning::Tag(tag) => format!(" tag={tag}"),
                Pinning::Commit(commit) => format!(" commit={}", short_hash(commit)),
            };
            let source = match &plugin.local_dir {
                Some(dir) => format!("local {}", dir.display()),
                None => plugin.url.clone(),
            };
            let state = match (plugin.installed, plugin.locked.as_deref()) {
                (false, _) => "missing".red().to_string(),
                (true, Some(commit)) => format!("locked {}", short_hash(commit)),
                (true, None) if plugin.local_dir.is_some() => "local".to_string(),
                (true, None) => "unlocked".yellow().to_string(),
            };
            println!("{} [{state}] {source}{pin}", plugin.name.bold());
        }
    }

    fn print_report(&self, report: &BatchReport) {
        self.drain();
        if report.issues.is_empty() {
            println!(
                "{} {}: {} succeeded",
                "DONE".green(),
                report.operation,
                report.succeeded
            );
        } else {
            println!(
                "{} {}: {} succeeded, {} issues",
                "DONE".yellow(),
                report.operation,
                report.succeeded,
                report.issues.len()
            );
        }
    }

    fn drain(&self) {
        for msg in self.events.try_iter() {
            match msg {
                Msg::Notify(notice) => print_notice(&notice),
                Msg::NewCommits { name, .. } => {
                    tracing::debug!("late new-commit result for {name} dropped");
                }
            }
        }
    }
}

fn print_notice(notice: &Notice) {
    let label = match notice.level {
        Level::Info => notice.level.label().green(),
        Level::Warn => notice.level.label().yellow(),
        Level::Error => notice.level.label().red().bold(),
    };
    println!("{label} {}", notice.text);
}

fn print_status(view: &StatusView) {
    println!("{}", "plugins".bold());
    if view.plugins.is_empty() {
        println!("  (none)");
    }
    for status in &view.plugins {
        let line = status.line();
        if status.pin.drifted || status.lock.label().is_some() {
            println!("  {}", line.yellow());
        } else {
            println!("  {line}");
        }
    }

    for (title, names) in status_sections(view) {
        print_section(title, names);
    }
}

/// Sections shown by `tether status`. The CLI host only lives for one
/// command and `status` loads nothing, so loaded/not-loaded is left out.
fn status_sections(view: &StatusView) -> [(&'static str, &[String]); 2] {
    [
        ("unmanaged directories", view.unmanaged.as_slice()),
        ("outdated lock entries", view.outdated_lock.as_slice()),
    ]
}

fn print_section(title: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    println!("{}", title.bold());
    for name in names {
        println!("  {name}");
    }
}

fn print_lines(lines: &[&str]) {
    for line in lines {
        println!("{line}");
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
