//! In-memory collaborators shared by the deploy scenario tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rollout_core::{HookPhase, RevisionId};
use rollout_deploy::{BoxError, CommandRunner, CommandStatus, DeployRequest, Scm};

/// Ordered log of everything hooks and commands did.
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.borrow().clone()
}

// ---------------------------------------------------------------------------
// Fake SCM
// ---------------------------------------------------------------------------

/// Resolves aliases (tags, branches) to fixed ids; anything else resolves to
/// itself. Checkout writes a small tree that looks like an application.
#[derive(Default)]
pub struct FakeScm {
    aliases: HashMap<String, String>,
    unresolvable: Vec<String>,
    failing_checkouts: RefCell<Vec<String>>,
    pub checkouts: Cell<usize>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alias(mut self, specifier: &str, revision: &str) -> Self {
        self.aliases.insert(specifier.into(), revision.into());
        self
    }

    pub fn unresolvable(mut self, specifier: &str) -> Self {
        self.unresolvable.push(specifier.into());
        self
    }

    pub fn fail_checkout_of(&self, revision: &str) {
        self.failing_checkouts.borrow_mut().push(revision.into());
    }
}

impl Scm for FakeScm {
    fn resolve(&self, specifier: &str) -> Result<RevisionId, BoxError> {
        if self.unresolvable.iter().any(|s| s == specifier) {
            return Err(format!("unknown revision {specifier}").into());
        }
        let id = self
            .aliases
            .get(specifier)
            .cloned()
            .unwrap_or_else(|| specifier.to_string());
        Ok(RevisionId::from(id))
    }

    fn checkout(&self, revision: &RevisionId, destination: &Path) -> Result<(), BoxError> {
        self.checkouts.set(self.checkouts.get() + 1);
        // Partially populate before failing, like an interrupted clone.
        fs::write(destination.join("REVISION"), revision.as_str())?;
        if self
            .failing_checkouts
            .borrow()
            .iter()
            .any(|r| r == revision.as_str())
        {
            return Err("remote hung up unexpectedly".into());
        }
        fs::create_dir_all(destination.join("config"))?;
        fs::write(destination.join("config/database.yml"), "from checkout")?;
        fs::create_dir_all(destination.join("log"))?;
        fs::write(destination.join("log/development.log"), "noise")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording runner
// ---------------------------------------------------------------------------

/// Records `<command>@<cwd name>` and fails any command listed in `failing`.
pub struct RecordingRunner {
    pub journal: Journal,
    pub failing: Vec<String>,
}

impl RecordingRunner {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: Rc::clone(journal),
            failing: Vec::new(),
        }
    }

    pub fn failing(mut self, command: &str) -> Self {
        self.failing.push(command.into());
        self
    }
}

impl CommandRunner for RecordingRunner {
    fn run(
        &self,
        command: &str,
        cwd: &Path,
        _env: &BTreeMap<String, String>,
    ) -> Result<CommandStatus, BoxError> {
        let dir = cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.journal.borrow_mut().push(format!("{command}@{dir}"));
        if self.failing.iter().any(|c| c == command) {
            Ok(CommandStatus { code: Some(1) })
        } else {
            Ok(CommandStatus::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A request with every hook bound to a journal entry; `failing` makes that
/// phase's hook return an error instead.
pub fn request(
    deploy_to: &Path,
    revision: &str,
    journal: &Journal,
    failing: Option<HookPhase>,
) -> DeployRequest<'static> {
    let mut req = DeployRequest::new(deploy_to, revision);
    req.restart_command = Some("restart".into());
    for &phase in HookPhase::all() {
        let journal = Rc::clone(journal);
        req.hooks.set(phase, move |ctx| {
            journal.borrow_mut().push(phase.to_string());
            assert_eq!(ctx.phase, phase);
            if failing == Some(phase) {
                Err("I am a failed deploy".into())
            } else {
                Ok(())
            }
        });
    }
    req
}

pub fn current_of(deploy_to: &Path) -> Option<PathBuf> {
    fs::read_link(deploy_to.join("current")).ok()
}
