use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use tokio::sync::oneshot;

use crate::common::error::GenieError;
use crate::coordinator::JobSubmitter;
use crate::model::{
    ChosenCriteria, Cluster, ClusterStatus, Command, CommandStatus, Criterion, Job, JobRequest,
    JobStatus,
};
use crate::services::{
    FileTransfer, MailService, ProcessExecutor, ProcessExit, ProcessSignal, ProcessSpec,
    StartedProcess,
};
use crate::workflow::JobExecutionContext;
use crate::{JobId, Map};

pub fn create_request(id: &str) -> JobRequest {
    JobRequest::new(JobId::new(id), "test job", "genie", "1.0")
}

/// Job in `INIT` running `command1` on `cluster1`, without an archive location.
pub fn create_job(request: &JobRequest) -> Job {
    Job {
        id: request.id.clone(),
        name: request.name.clone(),
        user: request.user.clone(),
        version: request.version.clone(),
        description: request.description.clone(),
        tags: request.tags.clone(),
        status: JobStatus::Init,
        status_msg: None,
        archive_location: None,
        created: Utc::now(),
        started: None,
        finished: None,
        exit_code: None,
        cluster_id: "cluster1".into(),
        command_id: "command1".into(),
        chosen_criteria: ChosenCriteria {
            cluster_criterion_index: 0,
            cluster_criterion: Criterion::any(),
            command_criterion_index: 0,
            command_criterion: Criterion::any(),
        },
    }
}

pub fn test_cluster(id: &str, tags: &[&str], active: bool) -> Cluster {
    Cluster {
        id: id.into(),
        name: format!("{id} cluster"),
        status: if active {
            ClusterStatus::Up
        } else {
            ClusterStatus::OutOfService
        },
        tags: tags.iter().map(|t| t.to_string()).collect(),
        resources: Default::default(),
    }
}

pub fn test_command(id: &str, tags: &[&str], cluster_ids: &[&str]) -> Command {
    Command {
        id: id.into(),
        name: format!("{id} command"),
        status: CommandStatus::Active,
        executable: "/bin/true".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        cluster_ids: cluster_ids.iter().map(|&c| c.into()).collect(),
        application_ids: vec![],
        resources: Default::default(),
    }
}

pub fn create_context(working_dir: &Path, id: &str) -> JobExecutionContext {
    let request = create_request(id);
    let job = create_job(&request);
    JobExecutionContext::new(
        working_dir,
        request,
        job,
        test_cluster("cluster1", &[], true),
        test_command("command1", &[], &["cluster1"]),
        vec![],
    )
}

/// Process executor that starts nothing and records what it was asked to do.
#[derive(Default)]
pub struct RecordingExecutor {
    next_pid: AtomicU32,
    fail_signals: AtomicBool,
    started: Mutex<Vec<ProcessSpec>>,
    signals: Mutex<Vec<(u32, ProcessSignal)>>,
    exits: Mutex<Map<u32, oneshot::Sender<ProcessExit>>>,
    on_start: Mutex<Option<Box<dyn FnMut() + Send>>>,
}

impl RecordingExecutor {
    pub fn started(&self) -> Vec<ProcessSpec> {
        self.started.lock().unwrap().clone()
    }

    pub fn signals(&self) -> Vec<(u32, ProcessSignal)> {
        self.signals.lock().unwrap().clone()
    }

    pub fn fail_signals(&self) {
        self.fail_signals.store(true, Ordering::SeqCst);
    }

    /// Called inside `start`, after the process "was started".
    pub fn on_start<F: FnMut() + Send + 'static>(&self, callback: F) {
        *self.on_start.lock().unwrap() = Some(Box::new(callback));
    }

    /// Makes the process with `pid` exit.
    pub fn finish(&self, pid: u32, exit: ProcessExit) {
        let sender = self.exits.lock().unwrap().remove(&pid).unwrap();
        sender.send(exit).unwrap();
    }
}

impl ProcessExecutor for RecordingExecutor {
    fn start(&self, spec: &ProcessSpec) -> crate::Result<StartedProcess> {
        let pid = 1000 + self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.started.lock().unwrap().push(spec.clone());
        let (sender, receiver) = oneshot::channel();
        self.exits.lock().unwrap().insert(pid, sender);
        if let Some(callback) = self.on_start.lock().unwrap().as_mut() {
            callback();
        }
        Ok(StartedProcess {
            pid,
            exit: receiver,
        })
    }

    fn signal_group(&self, pid: u32, signal: ProcessSignal) -> crate::Result<()> {
        if self.fail_signals.load(Ordering::SeqCst) {
            return Err(GenieError::SignalDeliveryFailed(format!(
                "No process group for pid {pid}"
            )));
        }
        self.signals.lock().unwrap().push((pid, signal));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailService {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingMailService {
    /// Pairs of recipient and subject.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl MailService for RecordingMailService {
    fn send_email(&self, to: &str, subject: &str, _body: &str) -> crate::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct FailingFileTransfer;

impl FileTransfer for FailingFileTransfer {
    fn is_valid(&self, _uri: &str) -> bool {
        true
    }

    fn get_file(&self, src_uri: &str, _dst_path: &Path) -> crate::Result<()> {
        Err(GenieError::FileTransferError(format!("{src_uri} is unreachable")))
    }

    fn put_file(&self, _src_path: &Path, dst_uri: &str) -> crate::Result<()> {
        Err(GenieError::FileTransferError(format!("{dst_uri} is unreachable")))
    }
}

#[derive(Default)]
pub struct RecordingSubmitter {
    fail: AtomicBool,
    submitted: Mutex<Vec<JobId>>,
}

impl RecordingSubmitter {
    pub fn fail_submissions(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> Vec<JobId> {
        self.submitted.lock().unwrap().clone()
    }
}

impl JobSubmitter for RecordingSubmitter {
    fn submit_job(&self, request: JobRequest) -> crate::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GenieError::SubmissionRejected("no capacity".to_string()));
        }
        self.submitted.lock().unwrap().push(request.id);
        Ok(())
    }
}
