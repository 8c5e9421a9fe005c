use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;

use deployment_helper::config::ProjectConfiguration;
use deployment_helper::environment::SALES_CHANNEL_URL;
use deployment_helper::error::{Error, ExecutionFailedDetails, Result};
use deployment_helper::extension::{ExtensionLifecycle, LifecycleVerb};
use deployment_helper::hooks::{HookExecutor, HookPhase};
use deployment_helper::license::LicenseService;
use deployment_helper::one_time_tasks::OneTimeTasks;
use deployment_helper::runner::{CommandInvocation, CommandOutcome, ProcessRunner};
use deployment_helper::state::InstallationState;
use deployment_helper::{ErrorCode, RunConfiguration, Stage, UpgradePipeline, UpgradeReport};

type Log = Rc<RefCell<Vec<String>>>;

struct FakeRunner {
    log: Log,
    fail_on: Option<String>,
    timeout: Cell<Option<Duration>>,
}

impl FakeRunner {
    fn record(&self, entry: String) -> Result<CommandOutcome> {
        self.log.borrow_mut().push(entry.clone());
        if self.fail_on.as_deref() == Some(entry.as_str()) {
            return Err(Error::execution_failed(ExecutionFailedDetails {
                command: entry,
                duration_ms: 1.0,
                exit_code: Some(1),
                timed_out: false,
            }));
        }
        Ok(CommandOutcome {
            command: entry,
            success: true,
            duration: Duration::from_millis(1),
            streamed: true,
        })
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, invocation: &CommandInvocation) -> Result<CommandOutcome> {
        self.record(format!("run {}", invocation.display()))
    }

    fn run_shell(&self, code: &str) -> Result<CommandOutcome> {
        self.record(format!("shell {}", code))
    }

    fn run_managed(&self, args: &[&str]) -> Result<CommandOutcome> {
        self.record(format!("console {}", args.join(" ")))
    }

    fn capture_json(&self, _args: &[&str]) -> Result<String> {
        Ok("[]".to_string())
    }

    fn set_timeout(&self, timeout: Option<Duration>) {
        self.log.borrow_mut().push("set timeout".to_string());
        self.timeout.set(timeout);
    }
}

struct FakeState {
    log: Log,
    previous: RefCell<String>,
    current: String,
    maintenance: Cell<bool>,
    storefront: bool,
    channel_exists: bool,
}

impl InstallationState for FakeState {
    fn previous_version(&self) -> Result<String> {
        Ok(self.previous.borrow().clone())
    }

    fn current_version(&self) -> Result<String> {
        Ok(self.current.clone())
    }

    fn is_maintenance_enabled(&self) -> Result<bool> {
        Ok(self.maintenance.get())
    }

    fn enable_maintenance(&self) -> Result<()> {
        self.log.borrow_mut().push("state enable maintenance".to_string());
        self.maintenance.set(true);
        Ok(())
    }

    fn disable_maintenance(&self) -> Result<()> {
        self.log.borrow_mut().push("state disable maintenance".to_string());
        self.maintenance.set(false);
        Ok(())
    }

    fn is_storefront_installed(&self) -> Result<bool> {
        Ok(self.storefront)
    }

    fn sales_channel_exists(&self, _url: &str) -> Result<bool> {
        Ok(self.channel_exists)
    }

    fn set_version(&self, version: &str) -> Result<()> {
        self.log.borrow_mut().push(format!("state set version {}", version));
        *self.previous.borrow_mut() = version.to_string();
        Ok(())
    }
}

struct FakeHooks {
    log: Log,
    fail_on: Option<HookPhase>,
}

impl HookExecutor for FakeHooks {
    fn execute(&self, phase: HookPhase) -> Result<()> {
        self.log.borrow_mut().push(format!("hook {}", phase.as_str()));
        if self.fail_on == Some(phase) {
            return Err(Error::internal_unexpected("hook failed"));
        }
        Ok(())
    }
}

struct FakeLifecycle {
    log: Log,
    kind: &'static str,
}

impl ExtensionLifecycle for FakeLifecycle {
    fn apply(&self, verb: LifecycleVerb, skip_assets: Option<bool>) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("{} {} {:?}", self.kind, verb.as_str(), skip_assets));
        Ok(())
    }
}

struct FakeTasks {
    log: Log,
}

impl OneTimeTasks for FakeTasks {
    fn execute(&self, out: &mut dyn Write) -> Result<()> {
        self.log.borrow_mut().push("one-time tasks".to_string());
        writeln!(out, "tasks done").map_err(|e| Error::internal_io(e.to_string(), None))
    }
}

struct FakeLicense {
    log: Log,
}

impl LicenseService for FakeLicense {
    fn refresh(&self, _out: &mut dyn Write, version: &str, domain: &str) -> Result<()> {
        self.log
            .borrow_mut()
            .push(format!("license {} {}", version, domain));
        Ok(())
    }
}

/// Knobs for one scripted run.
struct Scenario {
    previous: &'static str,
    current: &'static str,
    maintenance: bool,
    license_domain: &'static str,
    sales_channel_url: Option<&'static str>,
    storefront: bool,
    channel_exists: bool,
    fail_command: Option<&'static str>,
    fail_hook: Option<HookPhase>,
    config: RunConfiguration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            previous: "6.5.0.0",
            current: "6.5.0.0",
            maintenance: false,
            license_domain: "",
            sales_channel_url: None,
            storefront: false,
            channel_exists: false,
            fail_command: None,
            fail_hook: None,
            config: RunConfiguration::default(),
        }
    }
}

struct Outcome {
    result: Result<UpgradeReport>,
    log: Vec<String>,
    output: String,
    maintenance_left_on: bool,
    timeout: Option<Duration>,
}

fn execute(scenario: Scenario) -> Outcome {
    let log: Log = Rc::new(RefCell::new(Vec::new()));

    let runner = FakeRunner {
        log: log.clone(),
        fail_on: scenario.fail_command.map(str::to_string),
        timeout: Cell::new(Some(Duration::from_secs(999))),
    };
    let state = FakeState {
        log: log.clone(),
        previous: RefCell::new(scenario.previous.to_string()),
        current: scenario.current.to_string(),
        maintenance: Cell::new(false),
        storefront: scenario.storefront,
        channel_exists: scenario.channel_exists,
    };
    let hooks = FakeHooks {
        log: log.clone(),
        fail_on: scenario.fail_hook,
    };
    let plugins = FakeLifecycle {
        log: log.clone(),
        kind: "plugins",
    };
    let apps = FakeLifecycle {
        log: log.clone(),
        kind: "apps",
    };
    let tasks = FakeTasks { log: log.clone() };
    let license = FakeLicense { log: log.clone() };

    let mut project = ProjectConfiguration::default();
    project.deployment.maintenance.enabled = scenario.maintenance;
    project.deployment.store.license_domain = scenario.license_domain.to_string();

    let mut env = HashMap::new();
    if let Some(url) = scenario.sales_channel_url {
        env.insert(SALES_CHANNEL_URL.to_string(), url.to_string());
    }

    let pipeline = UpgradePipeline {
        state: &state,
        runner: &runner,
        hooks: &hooks,
        plugins: &plugins,
        apps: &apps,
        one_time_tasks: &tasks,
        license: &license,
        project: &project,
        env: &env,
    };

    let mut output = Vec::new();
    let result = pipeline.run(&scenario.config, &mut output);
    let entries = log.borrow().clone();

    Outcome {
        result,
        log: entries,
        output: String::from_utf8(output).unwrap(),
        maintenance_left_on: state.maintenance.get(),
        timeout: runner.timeout.get(),
    }
}

fn position(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{:?} not in {:?}", entry, log))
}

#[test]
fn full_run_executes_every_stage_in_order() {
    let outcome = execute(Scenario {
        previous: "6.5.0.0",
        current: "6.6.0.0",
        maintenance: true,
        license_domain: "shop.example.com",
        sales_channel_url: Some("https://shop.example.com"),
        storefront: true,
        channel_exists: false,
        ..Default::default()
    });

    let report = outcome.result.unwrap();
    assert_eq!(report.stages, Stage::ORDER.to_vec());
    assert_eq!(report.previous_version, "6.5.0.0");
    assert_eq!(report.current_version, "6.6.0.0");

    assert_eq!(
        outcome.log,
        vec![
            "set timeout",
            "hook pre-update",
            "state enable maintenance",
            "console cache:pool:clear cache.http cache.object",
            "console system:update:finish",
            "state set version 6.6.0.0",
            "console sales-channel:create:storefront --name=Storefront --url=https://shop.example.com",
            "console plugin:refresh",
            "console theme:refresh",
            "console scheduled-task:register",
            "plugins install Some(false)",
            "plugins update Some(false)",
            "plugins deactivate Some(false)",
            "plugins remove Some(false)",
            "license 6.6.0.0 shop.example.com",
            "apps install None",
            "apps update None",
            "apps deactivate None",
            "apps remove None",
            "console theme:compile --active-only",
            "one-time tasks",
            "hook post-update",
            "state disable maintenance",
            "console cache:pool:clear cache.http cache.object",
        ]
    );
    assert!(!outcome.maintenance_left_on);
}

#[test]
fn progress_lines_are_written_between_stages() {
    let outcome = execute(Scenario {
        previous: "unknown",
        current: "6.6.0.0",
        maintenance: true,
        ..Default::default()
    });

    assert_eq!(
        outcome.output,
        "Maintenance mode is enabled, clearing cache to make sure it is visible\n\
         Shopware is installed, running update tools\n\
         Updating Shopware from unknown to 6.6.0.0\n\
         tasks done\n\
         Maintenance mode is disabled, clearing cache to make sure the storefront is visible again\n"
    );
}

#[test]
fn unchanged_version_skips_finish_update() {
    let outcome = execute(Scenario::default());

    let report = outcome.result.unwrap();
    assert!(!report.ran(Stage::FinishUpdate));
    assert!(!outcome.log.iter().any(|e| e.contains("system:update:finish")));
    assert!(!outcome.log.iter().any(|e| e.starts_with("state set version")));
    assert!(!outcome.output.contains("Updating Shopware"));
}

#[test]
fn version_is_recorded_only_after_finish_update_succeeds() {
    let outcome = execute(Scenario {
        previous: "6.5.0.0",
        current: "6.6.0.0",
        ..Default::default()
    });
    let finish = position(&outcome.log, "console system:update:finish");
    let recorded = position(&outcome.log, "state set version 6.6.0.0");
    let first_extension = position(&outcome.log, "plugins install Some(false)");
    assert!(finish < recorded);
    assert!(finish < first_extension);

    let failed = execute(Scenario {
        previous: "6.5.0.0",
        current: "6.6.0.0",
        fail_command: Some("console system:update:finish"),
        ..Default::default()
    });
    let err = failed.result.unwrap_err();
    assert_eq!(err.code, ErrorCode::ExecutionFailed);
    assert_eq!(err.failed_command(), Some("console system:update:finish"));
    assert!(!failed.log.iter().any(|e| e.starts_with("state set version")));
    assert_eq!(failed.log.last().map(String::as_str), Some("console system:update:finish"));
}

#[test]
fn maintenance_brackets_the_run() {
    let outcome = execute(Scenario {
        previous: "6.5.0.0",
        current: "6.6.0.0",
        maintenance: true,
        ..Default::default()
    });

    let log = &outcome.log;
    let enable = position(log, "state enable maintenance");
    let finish = position(log, "console system:update:finish");
    let post_hook = position(log, "hook post-update");
    let disable = position(log, "state disable maintenance");

    assert_eq!(log[enable + 1], "console cache:pool:clear cache.http cache.object");
    assert!(enable < finish);
    assert!(post_hook < disable);
    assert_eq!(log[disable + 1], "console cache:pool:clear cache.http cache.object");
    assert_eq!(disable + 2, log.len());
}

#[test]
fn maintenance_disabled_in_config_never_touches_state() {
    let outcome = execute(Scenario::default());

    assert!(!outcome.log.iter().any(|e| e.contains("maintenance")));
    assert!(!outcome.log.iter().any(|e| e.contains("cache:pool:clear")));
}

#[test]
fn failure_aborts_remaining_stages_and_leaves_maintenance_on() {
    let outcome = execute(Scenario {
        maintenance: true,
        license_domain: "shop.example.com",
        fail_command: Some("console plugin:refresh"),
        ..Default::default()
    });

    let err = outcome.result.unwrap_err();
    assert_eq!(err.failed_command(), Some("console plugin:refresh"));
    assert_eq!(outcome.log.last().map(String::as_str), Some("console plugin:refresh"));

    for absent in [
        "console theme:refresh",
        "plugins install Some(false)",
        "license",
        "apps install None",
        "console theme:compile --active-only",
        "one-time tasks",
        "hook post-update",
        "state disable maintenance",
    ] {
        assert!(
            !outcome.log.iter().any(|e| e.starts_with(absent)),
            "{} ran after the failure",
            absent
        );
    }
    assert!(outcome.maintenance_left_on);
}

#[test]
fn collaborator_errors_propagate_unchanged() {
    let outcome = execute(Scenario {
        maintenance: true,
        fail_hook: Some(HookPhase::PreUpdate),
        ..Default::default()
    });

    let err = outcome.result.unwrap_err();
    assert_eq!(err.code, ErrorCode::InternalUnexpected);
    assert_eq!(err.details["error"], "hook failed");
    assert_eq!(outcome.log, vec!["set timeout", "hook pre-update"]);
}

#[test]
fn sales_channel_bootstrap_requires_all_three_conditions() {
    for url in [None, Some("https://shop.test")] {
        for storefront in [false, true] {
            for channel_exists in [false, true] {
                let outcome = execute(Scenario {
                    sales_channel_url: url,
                    storefront,
                    channel_exists,
                    ..Default::default()
                });

                let created = outcome
                    .log
                    .iter()
                    .any(|e| e.starts_with("console sales-channel:create:storefront"));
                let expected = url.is_some() && storefront && !channel_exists;
                assert_eq!(
                    created, expected,
                    "url={:?} storefront={} exists={}",
                    url, storefront, channel_exists
                );
                assert_eq!(outcome.result.unwrap().ran(Stage::BootstrapSalesChannel), expected);
            }
        }
    }
}

#[test]
fn skip_assets_reaches_finish_update_and_plugins_only() {
    let outcome = execute(Scenario {
        previous: "6.5.0.0",
        current: "6.6.0.0",
        config: RunConfiguration::new(300.0, true, false).unwrap(),
        ..Default::default()
    });

    let log = &outcome.log;
    position(log, "console system:update:finish --skip-asset-build");
    for verb in ["install", "update", "deactivate", "remove"] {
        position(log, &format!("plugins {} Some(true)", verb));
        position(log, &format!("apps {} None", verb));
    }
}

#[test]
fn skip_theme_compile_only_drops_theme_compile() {
    let outcome = execute(Scenario {
        maintenance: true,
        config: RunConfiguration::new(300.0, false, true).unwrap(),
        ..Default::default()
    });

    let report = outcome.result.unwrap();
    assert!(!outcome.log.iter().any(|e| e.contains("theme:compile")));
    assert!(!report.ran(Stage::CompileTheme));
    position(&outcome.log, "one-time tasks");
    position(&outcome.log, "hook post-update");
    position(&outcome.log, "state disable maintenance");
}

#[test]
fn license_refresh_needs_a_domain() {
    let without = execute(Scenario::default());
    assert!(!without.log.iter().any(|e| e.starts_with("license")));

    let with = execute(Scenario {
        current: "6.5.0.0",
        license_domain: "shop.example.com",
        ..Default::default()
    });
    let license = position(&with.log, "license 6.5.0.0 shop.example.com");
    assert!(position(&with.log, "plugins remove Some(false)") < license);
    assert!(license < position(&with.log, "apps install None"));
}

#[test]
fn run_applies_configured_timeout_before_any_stage() {
    let outcome = execute(Scenario {
        config: RunConfiguration::new(1.5, false, false).unwrap(),
        ..Default::default()
    });
    assert_eq!(outcome.log.first().map(String::as_str), Some("set timeout"));
    assert_eq!(outcome.timeout, Some(Duration::from_millis(1500)));

    let unlimited = execute(Scenario {
        config: RunConfiguration::new(0.0, false, false).unwrap(),
        ..Default::default()
    });
    assert_eq!(unlimited.timeout, None);
}
