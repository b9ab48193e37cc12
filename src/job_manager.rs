use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use log::{error, info};
use serde::Serialize;

use restaurant_scraper_lib::{Browser, Chrome, Pipeline, Progress, RunLogger, Settings, Site};

const MAX_LOG_LINES: usize = 50;
const PAUSE_POLL: Duration = Duration::from_millis(500);

type Jobs = Arc<Mutex<HashMap<String, JobStatus>>>;

#[derive(Clone, Serialize)]
pub struct JobStatus {
    pub id: String,
    pub site: String,
    pub source: String,
    pub status: String, // "queued", "processing", "paused", "stopped", "completed", "failed"
    pub requested: usize,
    pub total_records: usize,
    pub processed_count: usize,
    pub percent: u8,
    pub logs: Vec<String>,
    pub output_file: Option<String>,
    #[serde(skip)]
    pub control_req: String, // "none", "pause", "stop"
}

pub struct JobManager {
    pub jobs: Jobs,
    settings: Settings,
}

fn lock(jobs: &Jobs) -> MutexGuard<'_, HashMap<String, JobStatus>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

impl JobManager {
    pub fn new(settings: Settings) -> Self {
        JobManager {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn start_job(&self, site: Site, source: String, count: usize) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        let initial_status = JobStatus {
            id: job_id.clone(),
            site: site.to_string(),
            source: source.clone(),
            status: "queued".to_string(),
            requested: count,
            total_records: 0,
            processed_count: 0,
            percent: 0,
            logs: vec!["Job started.".to_string()],
            output_file: None,
            control_req: "none".to_string(),
        };
        lock(&self.jobs).insert(job_id.clone(), initial_status);

        let jobs = self.jobs.clone();
        let settings = self.settings.clone();
        let id = job_id.clone();
        thread::spawn(move || run_job(id, jobs, settings, site, source, count));

        job_id
    }

    pub fn send_control(&self, job_id: &str, signal: &str) -> bool {
        let mut guard = lock(&self.jobs);
        let Some(job) = guard.get_mut(job_id) else {
            return false;
        };
        match signal {
            "pause" => job.control_req = "pause".to_string(),
            "resume" => {
                job.control_req = "none".to_string();
                if job.status == "paused" {
                    job.status = "processing".to_string();
                }
            }
            "stop" => job.control_req = "stop".to_string(),
            _ => return false,
        }
        true
    }

    pub fn output_file(&self, job_id: &str) -> Option<String> {
        lock(&self.jobs).get(job_id).and_then(|j| j.output_file.clone())
    }
}

/// Mirrors pipeline progress into the shared job table and turns pause/stop
/// requests into waits and early exits between items.
struct JobProgress {
    id: String,
    jobs: Jobs,
}

impl JobProgress {
    fn update<F: FnOnce(&mut JobStatus)>(&self, f: F) {
        if let Some(job) = lock(&self.jobs).get_mut(&self.id) {
            f(job);
        }
    }

    fn push_log(&self, msg: String) {
        self.update(|job| {
            job.logs.push(msg);
            if job.logs.len() > MAX_LOG_LINES {
                job.logs.remove(0);
            }
        });
    }
}

impl Progress for JobProgress {
    fn begin(&mut self, total: usize) {
        self.update(|job| {
            job.total_records = total;
            job.status = "processing".to_string();
        });
    }

    fn percent(&mut self, pct: u8) {
        self.update(|job| job.percent = pct);
    }

    fn log(&mut self, msg: &str) {
        self.push_log(msg.to_string());
    }

    fn item_done(&mut self, index: usize) {
        self.update(|job| job.processed_count = index + 1);
    }

    fn should_continue(&self) -> bool {
        loop {
            let mut guard = lock(&self.jobs);
            let Some(job) = guard.get_mut(&self.id) else {
                return false;
            };
            match job.control_req.as_str() {
                "stop" => {
                    job.logs.push("Job stopped by user.".to_string());
                    return false;
                }
                "pause" => job.status = "paused".to_string(),
                _ => {
                    if job.status == "paused" {
                        job.status = "processing".to_string();
                        job.logs.push("Job resumed.".to_string());
                    }
                    return true;
                }
            }
            drop(guard);
            thread::sleep(PAUSE_POLL);
        }
    }
}

fn run_job(id: String, jobs: Jobs, settings: Settings, site: Site, source: String, count: usize) {
    let mut progress = JobProgress { id: id.clone(), jobs };
    progress.update(|job| job.status = "processing".to_string());

    let browser = match Chrome::launch(&settings) {
        Ok(b) => b,
        Err(e) => {
            error!("Job {}: could not start browser: {}", id, e);
            progress.push_log(format!("Could not start browser: {}", e));
            progress.update(|job| job.status = "failed".to_string());
            return;
        }
    };

    let log = RunLogger::new(site.name());
    info!("Job {} runs as {}/{}", id, site, log.run_id());
    let scraper = site.scraper(&browser, settings.timing(), log);
    let output_dir = settings.output_dir.join(&id);
    let pipeline = Pipeline::new(scraper.as_ref(), &output_dir);
    let result = pipeline.run(&source, count, &mut progress);
    let cleaned = pipeline.checkpoints().cleaned.to_string_lossy().into_owned();

    if let Err(e) = browser.close() {
        error!("Job {}: failed to close browser: {}", id, e);
    }

    match result {
        Ok(summary) => {
            let status = if summary.stopped { "stopped" } else { "completed" };
            progress.push_log(format!(
                "{} restaurants scraped, {} rows written.",
                summary.extracted, summary.rows
            ));
            progress.update(|job| {
                job.status = status.to_string();
                job.output_file = Some(cleaned);
            });
        }
        Err(e) => {
            error!("Job {} failed: {}", id, e);
            progress.push_log(format!("Job failed: {}", e));
            progress.update(|job| job.status = "failed".to_string());
        }
    }
}
