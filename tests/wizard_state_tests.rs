//! Wizard transition tests. No terminal involved: inputs go straight to `Wizard`.

mod common;

use common::blueprint;
use dotwizard::app::drain_pipeline;
use dotwizard::app::state::{
    Wizard, WizardAction, WizardInput, WizardState, EMPTY_PASSWORD_NOTICE,
    HELPER_REQUIRED_NOTICE, WRONG_PASSWORD_NOTICE,
};
use dotwizard::command_runner::CommandError;
use dotwizard::engine::{EventReceivers, PipelineError, PipelineResult, ProgressEvent};
use dotwizard::error::ProvisionError;
use dotwizard::install_state::Phase;
use std::sync::mpsc::{self, Receiver, SyncSender};

const BLUEPRINT: &str = r#"
settings:
  aur_helper: placeholder
  base_packages: [git]
steps:
  - id: helper
    title: AUR Helper
    type: single
    items:
      - { name: yay, desc: "Yet another yogurt" }
      - { name: paru, desc: "Feature packed helper" }
  - id: editors
    title: Editors
    items:
      - { name: vim }
      - { name: emacs }
"#;

fn wizard(requires_credential: bool) -> Wizard {
    Wizard::new(blueprint(BLUEPRINT), requires_credential)
}

fn press(wizard: &mut Wizard, inputs: &[WizardInput]) -> WizardAction {
    let mut last = WizardAction::None;
    for input in inputs {
        last = wizard.handle(*input);
    }
    last
}

fn type_text(wizard: &mut Wizard, text: &str) {
    for c in text.chars() {
        wizard.handle(WizardInput::Char(c));
    }
}

/// Walk to the summary choosing paru and vim.
fn to_confirmation(wizard: &mut Wizard) {
    use WizardInput::*;
    press(wizard, &[Confirm, Down, Toggle, Confirm, Toggle, Confirm]);
    assert_eq!(wizard.state(), WizardState::Confirmation);
}

#[test]
fn test_welcome_enters_first_step() {
    let mut w = wizard(true);
    assert_eq!(w.state(), WizardState::Welcome);
    w.handle(WizardInput::Confirm);
    assert_eq!(w.state(), WizardState::Selection { step: 0 });
    assert_eq!(w.cursor(), 0);
}

#[test]
fn test_helper_step_refuses_empty_selection() {
    let mut w = wizard(true);
    press(&mut w, &[WizardInput::Confirm, WizardInput::Confirm]);

    assert_eq!(w.state(), WizardState::Selection { step: 0 });
    assert_eq!(w.notice(), Some(HELPER_REQUIRED_NOTICE));

    press(&mut w, &[WizardInput::Toggle]);
    assert_eq!(w.notice(), None);
    press(&mut w, &[WizardInput::Confirm]);
    assert_eq!(w.state(), WizardState::Selection { step: 1 });
    assert_eq!(w.blueprint().settings.helper, "yay");
}

#[test]
fn test_single_mode_toggle_replaces_choice() {
    use WizardInput::*;
    let mut w = wizard(true);
    press(&mut w, &[Confirm, Toggle, Down, Toggle]);

    let helper_step = &w.blueprint().steps[0];
    assert_eq!(helper_step.selected_count(), 1);
    assert_eq!(helper_step.selected_items().next().unwrap().name, "paru");
}

#[test]
fn test_cursor_stays_in_bounds() {
    use WizardInput::*;
    let mut w = wizard(true);
    press(&mut w, &[Confirm, Up, Up]);
    assert_eq!(w.cursor(), 0);
    press(&mut w, &[Down, Down, Down]);
    assert_eq!(w.cursor(), 1);
}

#[test]
fn test_back_keeps_selections() {
    use WizardInput::*;
    let mut w = wizard(true);
    to_confirmation(&mut w);

    w.handle(Back);
    assert_eq!(w.state(), WizardState::Selection { step: 1 });
    w.handle(Back);
    assert_eq!(w.state(), WizardState::Selection { step: 0 });
    w.handle(Back);
    assert_eq!(w.state(), WizardState::Welcome);

    assert!(w.blueprint().steps[0].items[1].selected);
    assert!(w.blueprint().steps[1].items[0].selected);
}

#[test]
fn test_summary_lists_helper_then_selections() {
    let mut w = wizard(true);
    to_confirmation(&mut w);
    assert_eq!(w.summary(), vec!["paru (AUR Helper)", "vim"]);
}

#[test]
fn test_password_flow_retries_after_rejection() {
    let mut w = wizard(true);
    to_confirmation(&mut w);

    w.handle(WizardInput::Confirm);
    assert_eq!(w.state(), WizardState::Authenticating);

    assert_eq!(w.handle(WizardInput::Confirm), WizardAction::None);
    assert_eq!(w.notice(), Some(EMPTY_PASSWORD_NOTICE));

    type_text(&mut w, "wrongx");
    w.handle(WizardInput::Backspace);
    assert_eq!(w.masked_password().chars().count(), 5);
    assert_eq!(
        w.handle(WizardInput::Confirm),
        WizardAction::VerifyCredential("wrong".to_string())
    );
    assert!(w.is_verifying());

    // Keys are ignored while the check runs.
    w.handle(WizardInput::Char('z'));
    assert_eq!(w.on_verification(Err("Sorry".into())), WizardAction::None);
    assert_eq!(w.state(), WizardState::Authenticating);
    assert_eq!(w.notice(), Some(WRONG_PASSWORD_NOTICE));
    assert_eq!(w.masked_password(), "");

    type_text(&mut w, "secret");
    assert_eq!(
        w.handle(WizardInput::Confirm),
        WizardAction::VerifyCredential("secret".to_string())
    );
    assert_eq!(
        w.on_verification(Ok(())),
        WizardAction::StartPipeline {
            credential: Some("secret".to_string())
        }
    );
    assert_eq!(w.state(), WizardState::Installing);
    assert_eq!(w.masked_password(), "");
}

#[test]
fn test_passwordless_confirmation_starts_pipeline_directly() {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    assert_eq!(
        w.handle(WizardInput::Confirm),
        WizardAction::StartPipeline { credential: None }
    );
    assert_eq!(w.state(), WizardState::Installing);
}

#[test]
fn test_frozen_blueprint_ignores_later_edits() {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    let frozen = w.frozen_blueprint();

    w.handle(WizardInput::Back);
    w.handle(WizardInput::Down);
    w.handle(WizardInput::Toggle);

    assert!(!frozen.steps[1].items[1].selected);
    assert!(w.blueprint().steps[1].items[1].selected);
    assert_eq!(frozen.settings.helper, "paru");
}

#[test]
fn test_interrupt_quits_from_every_state() {
    let mut w = wizard(true);
    assert_eq!(w.handle(WizardInput::Interrupt), WizardAction::Quit);

    w.handle(WizardInput::Confirm);
    assert_eq!(w.handle(WizardInput::Interrupt), WizardAction::Quit);

    let mut w = wizard(true);
    to_confirmation(&mut w);
    w.handle(WizardInput::Confirm);
    assert_eq!(w.state(), WizardState::Authenticating);
    assert_eq!(w.handle(WizardInput::Interrupt), WizardAction::Quit);
}

#[test]
fn test_installing_progress_and_log_panel() {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    w.handle(WizardInput::Confirm);

    w.on_progress(ProgressEvent {
        percent: 0.2,
        label: "Installing Packages...".into(),
    });
    w.on_progress(ProgressEvent {
        percent: 0.1,
        label: "stale".into(),
    });
    assert_eq!(w.progress(), 0.2);

    for i in 0..5 {
        w.on_log(format!("line {}", i));
    }
    assert!(!w.show_logs());
    w.handle(WizardInput::ToggleLogs);
    assert!(w.show_logs());

    w.handle(WizardInput::Up);
    w.handle(WizardInput::Up);
    assert_eq!(w.log_scroll(), 2);
    w.on_log("line 5".into());
    assert_eq!(w.log_scroll(), 3);
    w.handle(WizardInput::Down);
    assert_eq!(w.log_scroll(), 2);

    w.handle(WizardInput::ToggleLogs);
    assert!(!w.show_logs());
    assert_eq!(w.log_scroll(), 0);
}

#[test]
fn test_pipeline_failure_keeps_user_on_install_screen() {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    w.handle(WizardInput::Confirm);

    let failure = PipelineError {
        phase: Phase::InstallingPackages,
        source: ProvisionError::from(CommandError::Exit {
            program: "paru".into(),
            code: Some(1),
            tail: vec!["error: target not found: vim".into()],
        }),
    };
    w.on_finished(Err(failure));

    assert_eq!(w.state(), WizardState::Installing);
    assert!(w.show_logs());
    let last = w.logs().last().unwrap();
    assert!(last.starts_with("ERROR: "), "{}", last);
    assert!(last.contains("target not found"), "{}", last);
    assert!(w.failure().is_some());
    assert_eq!(w.handle(WizardInput::Confirm), WizardAction::None);
}

#[test]
fn test_success_reaches_done_and_enter_quits() {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    w.handle(WizardInput::Confirm);
    w.on_finished(Ok(()));

    assert_eq!(w.state(), WizardState::Done);
    assert_eq!(w.progress(), 1.0);
    assert_eq!(w.handle(WizardInput::Confirm), WizardAction::Quit);
}

#[test]
fn test_blueprint_without_steps_goes_to_summary() {
    let mut w = Wizard::new(blueprint("settings: { aur_helper: yay }\n"), false);
    w.handle(WizardInput::Confirm);
    assert_eq!(w.state(), WizardState::Confirmation);
    w.handle(WizardInput::Back);
    assert_eq!(w.state(), WizardState::Welcome);
}

struct FakePipeline {
    progress: SyncSender<ProgressEvent>,
    logs: SyncSender<String>,
    done: SyncSender<PipelineResult>,
    events: EventReceivers,
    done_rx: Receiver<PipelineResult>,
}

fn fake_pipeline() -> FakePipeline {
    let (progress, progress_rx) = mpsc::sync_channel(16);
    let (logs, logs_rx) = mpsc::sync_channel(16);
    let (done, done_rx) = mpsc::sync_channel(1);
    FakePipeline {
        progress,
        logs,
        done,
        events: EventReceivers {
            progress: progress_rx,
            logs: logs_rx,
        },
        done_rx,
    }
}

fn installing_wizard() -> Wizard {
    let mut w = wizard(false);
    to_confirmation(&mut w);
    w.handle(WizardInput::Confirm);
    assert_eq!(w.state(), WizardState::Installing);
    w
}

#[test]
fn test_drain_keeps_installing_until_outcome_arrives() {
    let mut w = installing_wizard();
    let pipe = fake_pipeline();

    pipe.progress
        .send(ProgressEvent {
            percent: 0.2,
            label: "Installing Packages...".into(),
        })
        .unwrap();
    pipe.logs.send("resolving dependencies...".into()).unwrap();
    assert!(!drain_pipeline(&mut w, &pipe.events, &pipe.done_rx));
    assert_eq!(w.state(), WizardState::Installing);
    assert_eq!(w.progress(), 0.2);

    pipe.logs.send("installing vim".into()).unwrap();
    pipe.logs.send("Done!".into()).unwrap();
    pipe.done.send(Ok(())).unwrap();
    assert!(drain_pipeline(&mut w, &pipe.events, &pipe.done_rx));

    assert_eq!(w.state(), WizardState::Done);
    let tail: Vec<&str> = w.logs().iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["resolving dependencies...", "installing vim", "Done!"]);
}

#[test]
fn test_drain_applies_failure_after_queued_lines() {
    let mut w = installing_wizard();
    let pipe = fake_pipeline();

    pipe.logs.send("Running script: broken".into()).unwrap();
    pipe.logs.send("exit status 7".into()).unwrap();
    pipe.done
        .send(Err(PipelineError {
            phase: Phase::RunningScripts,
            source: ProvisionError::step("script broken failed"),
        }))
        .unwrap();

    assert!(drain_pipeline(&mut w, &pipe.events, &pipe.done_rx));

    let logs = w.logs();
    let broken = logs.iter().position(|l| l == "Running script: broken").unwrap();
    let status = logs.iter().position(|l| l == "exit status 7").unwrap();
    let error = logs.iter().position(|l| l.starts_with("ERROR: ")).unwrap();
    assert!(broken < status && status < error, "{:?}", logs);
    assert_eq!(error, logs.len() - 1);
    assert_eq!(w.state(), WizardState::Installing);
    assert!(w.show_logs());
}

#[test]
fn test_drain_stops_when_pipeline_thread_vanishes() {
    let mut w = installing_wizard();
    let pipe = fake_pipeline();
    drop(pipe.done);
    assert!(drain_pipeline(&mut w, &pipe.events, &pipe.done_rx));
    assert_eq!(w.state(), WizardState::Installing);
}
