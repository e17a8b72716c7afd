// In-memory collaborators for unit tests.
use crate::config::Selectors;
use crate::model::{BrowserError, NotifyError};
use crate::notifier::Messenger;
use crate::scraper::{Browser, BrowserLauncher, RowHandle};
use crate::supervisor::Clock;
use chrono::{DateTime, Local, TimeZone};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct FakeRow {
    pub text: String,
    pub visible: bool,
    pub broken: bool,
    fields: HashMap<String, String>,
    attrs: HashMap<(String, String), String>,
}

impl FakeRow {
    /// A result row laid out like the portal's, with labels in line-break form.
    pub fn tender(buyer: &str, objet: &str, deadline: &str, href: Option<&str>) -> Self {
        let s = Selectors::default();
        let mut row = FakeRow { visible: true, ..Default::default() };
        row.fields.insert(s.object.clone(), format!("Objet\n: {}", objet));
        row.fields.insert(s.buyer.clone(), format!("Acheteur public\n: {}", buyer));
        row.fields.insert(s.deadline.clone(), deadline.to_string());
        if let Some(href) = href {
            row.attrs.insert((s.action_link.clone(), "href".into()), href.to_string());
        }
        row.text = format!("Objet\n: {}\nAcheteur public\n: {}\n{}", objet, buyer, deadline);
        row
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }
}

#[async_trait::async_trait]
impl RowHandle for FakeRow {
    async fn inner_text(&self) -> Result<String, BrowserError> {
        Ok(self.text.clone())
    }

    async fn is_visible(&self) -> Result<bool, BrowserError> {
        Ok(self.visible)
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        if self.broken {
            return Err(BrowserError::ElementNotFound(format!("{} (detached)", selector)));
        }
        Ok(self.fields.get(selector).cloned())
    }

    async fn attr_of(&self, selector: &str, attr: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.attrs.get(&(selector.to_string(), attr.to_string())).cloned())
    }
}

/// Portal double: serves `pages` once the search is submitted.
#[derive(Debug, Clone)]
pub struct FakePortal {
    pub pages: Vec<Vec<FakeRow>>,
    pub total_text: Option<String>,
    pub has_results: bool,
    pub fail_navigation: bool,
    pub fail_page_size: bool,
    /// The page-size select accepts the value but the page never reloads.
    pub page_size_without_reload: bool,
    /// Clicking "next" from this page fails.
    pub fail_advance_from: Option<usize>,
    pub calls: Arc<Mutex<Vec<String>>>,
    current: usize,
    reload_pending: bool,
}

impl FakePortal {
    pub fn with_pages(pages: Vec<Vec<FakeRow>>, total: u32) -> Self {
        Self {
            pages,
            total_text: Some(format!("Nombre de résultats : {}", total)),
            has_results: true,
            fail_navigation: false,
            fail_page_size: false,
            page_size_without_reload: false,
            fail_advance_from: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            current: 0,
            reload_pending: false,
        }
    }

    pub fn empty() -> Self {
        let mut portal = Self::with_pages(Vec::new(), 0);
        portal.has_results = false;
        portal
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls").push(call);
    }

    pub fn recorded(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

#[async_trait::async_trait]
impl Browser for FakePortal {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        self.record(format!("navigate {}", url));
        if self.fail_navigation {
            return Err(BrowserError::HttpError("connection reset".into()));
        }
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.record(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn select_option(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.record(format!("select {}={}", selector, value));
        if self.fail_page_size && selector == Selectors::default().page_size {
            return Err(BrowserError::OptionNotFound {
                selector: selector.into(),
                value: value.into(),
            });
        }
        if self.page_size_without_reload && selector == Selectors::default().page_size {
            self.reload_pending = true;
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.record(format!("click {}", selector));
        if selector == Selectors::default().next_page {
            let last = self.current + 1 >= self.pages.len();
            if last || self.fail_advance_from == Some(self.current + 1) {
                return Err(BrowserError::ElementNotFound(selector.into()));
            }
            self.current += 1;
        }
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.has_results {
            Ok(())
        } else {
            Err(BrowserError::Timeout { what: selector.into(), after: timeout })
        }
    }

    async fn wait_for_network_idle(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        if std::mem::take(&mut self.reload_pending) {
            return Err(BrowserError::Timeout { what: "page reload".into(), after: timeout });
        }
        Ok(())
    }

    async fn text(&self, selector: &str) -> Result<Option<String>, BrowserError> {
        if selector == Selectors::default().result_count {
            return Ok(self.total_text.clone());
        }
        Ok(None)
    }

    async fn rows(&self, _selector: &str) -> Result<Vec<Box<dyn RowHandle>>, BrowserError> {
        Ok(self
            .pages
            .get(self.current)
            .map(|rows| rows.iter().cloned().map(|r| Box::new(r) as Box<dyn RowHandle>).collect())
            .unwrap_or_default())
    }
}

/// Hands out clones of `portal`; queued failures are returned first.
pub struct FakeLauncher {
    pub portal: FakePortal,
    pub failures: Mutex<VecDeque<String>>,
    pub launches: Mutex<u32>,
}

impl FakeLauncher {
    pub fn new(portal: FakePortal) -> Self {
        Self { portal, failures: Mutex::new(VecDeque::new()), launches: Mutex::new(0) }
    }

    pub fn launch_count(&self) -> u32 {
        *self.launches.lock().expect("launches")
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn Browser>, BrowserError> {
        *self.launches.lock().expect("launches") += 1;
        if let Some(reason) = self.failures.lock().expect("failures").pop_front() {
            return Err(BrowserError::Launch(reason));
        }
        Ok(Box::new(self.portal.clone()))
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self { fail: true, ..Default::default() }
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.sent.lock().expect("sent").clone()
    }
}

#[async_trait::async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, recipient: &str, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().expect("sent").push((recipient.to_string(), text.to_string()));
        if self.fail {
            return Err(NotifyError::Unreachable);
        }
        Ok(())
    }
}

/// Clock frozen at a fixed instant that records requested sleeps.
pub struct ManualClock {
    now: DateTime<Local>,
    pub sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn at(year: i32, month: u32, day: u32) -> Self {
        let now = Local
            .with_ymd_and_hms(year, month, day, 9, 0, 0)
            .single()
            .expect("valid local time");
        Self { now, sleeps: Mutex::new(Vec::new()) }
    }

    pub fn slept(&self) -> Vec<Duration> {
        self.sleeps.lock().expect("sleeps").clone()
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        self.now
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().expect("sleeps").push(duration);
    }
}
