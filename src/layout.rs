use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::config::LayoutConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass { Mobile, Desktop }

impl DeviceClass {
    pub fn from_width(width: u32, breakpoint: u32) -> Self {
        if width <= breakpoint { DeviceClass::Mobile } else { DeviceClass::Desktop }
    }
}

/// Left offset of the main content. On mobile the sidebar overlays instead of reflowing.
pub fn content_offset(device: DeviceClass, hovered: bool, cfg: &LayoutConfig) -> u32 {
    match (device, hovered) {
        (DeviceClass::Mobile, _) => 0,
        (DeviceClass::Desktop, true) => cfg.expanded_width,
        (DeviceClass::Desktop, false) => cfg.collapsed_width,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutState {
    pub device: DeviceClass,
    pub hovered: bool,
    pub attached: bool,
    pub offset: u32,
}

/// What a mounted sidebar exposes: a way to listen to its hover state.
#[derive(Debug, Clone)]
pub struct SidebarHandle {
    id: u64,
    hover: Arc<watch::Sender<bool>>,
}

impl SidebarHandle {
    fn listen(&self) -> watch::Receiver<bool> {
        self.hover.subscribe()
    }
}

/// Mount point shared by the sidebar and the coordinator.
#[derive(Debug, Clone)]
pub struct SidebarSlot {
    tx: Arc<watch::Sender<Option<SidebarHandle>>>,
    mounts: Arc<AtomicU64>,
}

impl Default for SidebarSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SidebarSlot {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx), mounts: Arc::new(AtomicU64::new(0)) }
    }

    /// Mounts a sidebar. It stays available until the returned value is dropped.
    pub fn mount(&self) -> Sidebar {
        let id = self.mounts.fetch_add(1, Ordering::Relaxed) + 1;
        let (hover, _) = watch::channel(false);
        let hover = Arc::new(hover);
        self.tx.send_replace(Some(SidebarHandle { id, hover: hover.clone() }));
        Sidebar { id, hover, slot: self.clone() }
    }

    pub fn is_mounted(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Number of coordinators currently waiting for a sidebar to appear.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }

    fn observe(&self) -> watch::Receiver<Option<SidebarHandle>> {
        self.tx.subscribe()
    }
}

/// A mounted sidebar. Dropping it unmounts.
#[derive(Debug)]
pub struct Sidebar {
    id: u64,
    hover: Arc<watch::Sender<bool>>,
    slot: SidebarSlot,
}

impl Sidebar {
    pub fn pointer_enter(&self) {
        self.hover.send_replace(true);
    }

    pub fn pointer_leave(&self) {
        self.hover.send_replace(false);
    }

    /// Hover listeners attached to this sidebar.
    pub fn listener_count(&self) -> usize {
        self.hover.receiver_count()
    }
}

impl Drop for Sidebar {
    fn drop(&mut self) {
        let id = self.id;
        // a newer mount may already own the slot
        self.slot.tx.send_if_modified(|current| match current {
            Some(handle) if handle.id == id => {
                *current = None;
                true
            }
            _ => false,
        });
    }
}

/// Handle to the running coordinator task. Dropping it tears the task down
/// together with its hover listener, slot observer and pending collapse timer.
pub struct LayoutCoordinator {
    state: watch::Receiver<LayoutState>,
    task: Option<JoinHandle<()>>,
}

impl LayoutCoordinator {
    pub fn spawn(cfg: LayoutConfig, viewport: watch::Receiver<u32>, slot: SidebarSlot) -> Self {
        let device = DeviceClass::from_width(*viewport.borrow(), cfg.mobile_breakpoint);
        let initial = LayoutState {
            device,
            hovered: false,
            attached: false,
            offset: content_offset(device, false, &cfg),
        };
        let (out, state) = watch::channel(initial);
        let driver = Driver {
            cfg,
            viewport: Some(viewport),
            slot,
            out,
            device,
            hovered: false,
            hover: None,
            observer: None,
            attach_deadline: None,
            collapse_at: None,
        };
        Self { state, task: Some(tokio::spawn(driver.run())) }
    }

    pub fn state(&self) -> LayoutState {
        *self.state.borrow()
    }

    pub fn offset(&self) -> u32 {
        self.state.borrow().offset
    }

    pub fn subscribe(&self) -> watch::Receiver<LayoutState> {
        self.state.clone()
    }

    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for LayoutCoordinator {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct Driver {
    cfg: LayoutConfig,
    viewport: Option<watch::Receiver<u32>>,
    slot: SidebarSlot,
    out: watch::Sender<LayoutState>,
    device: DeviceClass,
    hovered: bool,
    hover: Option<watch::Receiver<bool>>,
    observer: Option<watch::Receiver<Option<SidebarHandle>>>,
    attach_deadline: Option<Instant>,
    collapse_at: Option<Instant>,
}

/// Next value of an optional watch; `None` once the sender is gone.
/// Never resolves while `rx` is unset.
async fn next_value<T: Clone>(rx: &mut Option<watch::Receiver<T>>) -> Option<T> {
    let Some(inner) = rx.as_mut() else {
        return pending().await;
    };
    match inner.changed().await {
        Ok(()) => Some(inner.borrow_and_update().clone()),
        Err(_) => None,
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}

impl Driver {
    async fn run(mut self) {
        self.begin_attach();
        self.publish();
        loop {
            let attach_deadline = self.attach_deadline;
            let collapse_at = self.collapse_at;
            tokio::select! {
                width = next_value(&mut self.viewport) => self.on_resize(width),
                hovered = next_value(&mut self.hover) => self.on_hover(hovered),
                mounted = next_value(&mut self.observer) => self.on_slot_change(mounted),
                _ = sleep_until_opt(attach_deadline) => self.on_attach_timeout(),
                _ = sleep_until_opt(collapse_at) => self.on_collapse(),
            }
            self.publish();
        }
    }

    fn publish(&self) {
        let next = LayoutState {
            device: self.device,
            hovered: self.hovered,
            attached: self.hover.is_some(),
            offset: content_offset(self.device, self.hovered, &self.cfg),
        };
        self.out.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    /// Attaches now if the sidebar is mounted, otherwise observes the slot
    /// until it is or the attach timeout passes.
    fn begin_attach(&mut self) {
        if self.hover.is_some() || self.observer.is_some() {
            return;
        }
        let mut observer = self.slot.observe();
        let mounted = observer.borrow_and_update().clone();
        match mounted {
            Some(handle) => self.attach(handle),
            None => {
                debug!(timeout = ?self.cfg.attach_timeout, "sidebar not mounted yet, observing slot");
                self.observer = Some(observer);
                self.attach_deadline = Some(Instant::now() + self.cfg.attach_timeout);
            }
        }
    }

    fn attach(&mut self, handle: SidebarHandle) {
        let mut hover = handle.listen();
        self.hovered = *hover.borrow_and_update();
        self.hover = Some(hover);
        self.observer = None;
        self.attach_deadline = None;
        info!(sidebar = handle.id, "sidebar hover attached");
    }

    fn on_slot_change(&mut self, mounted: Option<Option<SidebarHandle>>) {
        match mounted {
            Some(Some(handle)) => self.attach(handle),
            Some(None) => {}
            None => {
                self.observer = None;
                self.attach_deadline = None;
            }
        }
    }

    fn on_attach_timeout(&mut self) {
        warn!(timeout = ?self.cfg.attach_timeout, "sidebar never mounted, keeping collapsed layout");
        self.observer = None;
        self.attach_deadline = None;
    }

    fn on_hover(&mut self, hovered: Option<bool>) {
        match hovered {
            Some(true) => {
                self.hovered = true;
                self.collapse_at = None;
            }
            Some(false) => {
                if self.hovered && self.collapse_at.is_none() {
                    self.collapse_at = Some(Instant::now() + self.cfg.grace_delay);
                }
            }
            None => {
                info!("sidebar unmounted, waiting for remount");
                self.hover = None;
                self.hovered = false;
                self.collapse_at = None;
                self.begin_attach();
            }
        }
    }

    fn on_collapse(&mut self) {
        self.hovered = false;
        self.collapse_at = None;
    }

    fn on_resize(&mut self, width: Option<u32>) {
        let Some(width) = width else {
            debug!("viewport source closed, keeping last device class");
            self.viewport = None;
            return;
        };
        let device = DeviceClass::from_width(width, self.cfg.mobile_breakpoint);
        if device == self.device {
            return;
        }
        debug!(width, ?device, "device class changed");
        self.device = device;
        // listeners survive flips; only a detached coordinator searches again
        self.begin_attach();
    }
}
