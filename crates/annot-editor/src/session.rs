//! The editor session: one canvas, its scene, and everything acting on it.
//!
//! The session owns the scene exclusively. Pointer input arrives in screen
//! coordinates, is mapped through the viewport and routed to the tool that
//! owns the gesture. Work that would be asynchronous in a browser (image
//! decoding, history replay) is queued as [`Task`]s and run by
//! [`EditorSession::pump`], which the host calls once per frame with a
//! monotonic timestamp. The same call commits debounced history snapshots.
//!
//! Image work whose bytes the host has not delivered yet is parked and
//! retried on every pump until the pixels arrive, the host reports a fetch
//! failure, or [`EditorConfig::image_wait_ms`] runs out. While an image-only
//! description is parked the history baseline is not taken and saving is
//! refused, so an unfinished load can never be written back as empty.

use crate::clipboard::{
    capture, copy_strategies, duplicate_strategies, Clipboard, ExtractionInput,
};
use crate::config::EditorConfig;
use crate::crop::CropSession;
use crate::error::EditorError;
use crate::history::{decode_snapshot, encode_snapshot, History, Snapshot};
use crate::input::{InputEvent, Modifiers, PointerButton};
use crate::loader::{abbreviate, load_pixels, DataUriLoader, ImageLoader};
use crate::mutation::{apply_mutation, SceneEvent, SceneMutation};
use crate::persist::{self, ContentSink, SaveOutcome, SavePlan, UploadService};
use crate::settings::{SettingKey, SettingsStore, ToolSettings};
use crate::shortcuts::{KeyContext, ShortcutAction, ShortcutMap};
use crate::tools::{
    DrawTool, ImageTool, ResizeHandle, SelectTool, ShapeKind, ShapeTool, TextTool, Tool,
    ToolContext, ToolKind, ToolOutput,
};
use annot_core::document::PersistedContent;
use annot_core::id::ObjectId;
use annot_core::model::{ObjectKind, ObjectStyle, Scene, SceneObject};
use annot_core::viewport::{ViewportTransform, VirtualCanvas};
use annot_core::Color;
use annot_render::pixels::{encode_png, is_data_uri, ImageCache};
use annot_render::raster::{content_bounds, render_region, render_view};
use annot_render::text::{text_runs, FontBook, TextRun};
use annot_render::{hit_test, hit_test_rect};
use image::RgbaImage;
use kurbo::{Point, Rect, Size};
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::time::Duration;

// ─── Deferred work ───────────────────────────────────────────────────────

/// How a freshly loaded image is sized and positioned.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Placement {
    /// Keep the transform; rescale to `rendered` once the pixels are known.
    Keep { rendered: Option<Size> },
    /// Center on `center` at a width derived from the natural width.
    Centered { center: Point, width: WidthRule },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WidthRule {
    AtMost(f64),
    Inserted,
}

#[derive(Debug, Clone)]
enum Task {
    Replay(Snapshot),
    LoadImage {
        src: String,
        replay: bool,
    },
    PlaceImage {
        object: Box<SceneObject>,
        fallback: Option<String>,
        placement: Placement,
        select: bool,
    },
}

impl Task {
    /// Source whose pixels this task waits on.
    fn image_src(&self) -> Option<&str> {
        match self {
            Task::Replay(_) => None,
            Task::LoadImage { src, .. } => Some(src),
            Task::PlaceImage { object, .. } => object.image_src(),
        }
    }

    /// Whether the task will add an object to the scene.
    fn places(&self) -> bool {
        matches!(self, Task::PlaceImage { .. })
    }
}

/// A task waiting for image bytes, parked since `since`.
#[derive(Debug, Clone)]
struct Parked {
    since: Duration,
    task: Task,
}

// ─── Session ─────────────────────────────────────────────────────────────

pub struct EditorSession {
    scene: Scene,
    viewport: ViewportTransform,
    canvas: VirtualCanvas,
    screen: Size,
    config: EditorConfig,
    settings: ToolSettings,
    store: Option<Box<dyn SettingsStore>>,

    active: ToolKind,
    select_tool: SelectTool,
    draw_tool: DrawTool,
    text_tool: TextTool,
    shape_tool: ShapeTool,
    image_tool: ImageTool,
    /// Tool owning the pointer gesture in progress.
    gesture: Option<ToolKind>,
    pan_anchor: Option<Point>,
    pan_armed: bool,
    marquee: Option<Rect>,
    selection: SmallVec<[ObjectId; 4]>,

    history: History,
    clipboard: Clipboard,
    crop: Option<CropSession>,
    images: ImageCache,
    fonts: FontBook,
    loader: Box<dyn ImageLoader>,
    tasks: VecDeque<Task>,
    parked: Vec<Parked>,
    events: Vec<SceneEvent>,
    notices: Vec<String>,

    editing_text: Option<ObjectId>,
    editing: bool,
    on_editing: Option<Box<dyn FnMut(bool)>>,
    baseline_pending: bool,
    image_requested: bool,
    now: Duration,
}

impl EditorSession {
    /// A session with an empty scene sized for a `screen`-sized viewport.
    pub fn new(screen: Size, config: EditorConfig) -> Self {
        let canvas = VirtualCanvas::for_viewport(screen);
        let viewport = ViewportTransform::centered(&canvas, screen);
        let history = History::new(config.history_limit, config.snapshot_debounce());
        Self {
            scene: Scene::new(),
            viewport,
            canvas,
            screen,
            config,
            settings: ToolSettings::default(),
            store: None,
            active: ToolKind::Select,
            select_tool: SelectTool::new(),
            draw_tool: DrawTool::new(),
            text_tool: TextTool,
            shape_tool: ShapeTool::new(ShapeKind::Rect),
            image_tool: ImageTool,
            gesture: None,
            pan_anchor: None,
            pan_armed: false,
            marquee: None,
            selection: SmallVec::new(),
            history,
            clipboard: Clipboard::shared(),
            crop: None,
            images: ImageCache::new(),
            fonts: FontBook::new(),
            loader: Box::new(DataUriLoader),
            tasks: VecDeque::new(),
            parked: Vec::new(),
            events: Vec::new(),
            notices: Vec::new(),
            editing_text: None,
            editing: false,
            on_editing: None,
            baseline_pending: true,
            image_requested: false,
            now: Duration::ZERO,
        }
    }

    pub fn with_loader(mut self, loader: Box<dyn ImageLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Clipboard) -> Self {
        self.clipboard = clipboard;
        self
    }

    /// Restore sticky settings (including the last tool) from `store` and
    /// write every later change back to it.
    pub fn with_settings_store(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.settings = ToolSettings::load(store.as_ref());
        self.active = self.settings.tool;
        if let Some(shape) = self.active.shape() {
            self.shape_tool.set_shape(shape);
        }
        self.store = Some(store);
        self
    }

    /// Called with `true` when an editing interaction starts (pointer
    /// gesture, text edit, crop) and `false` when the last one ends.
    pub fn set_editing_listener(&mut self, listener: impl FnMut(bool) + 'static) {
        self.on_editing = Some(Box::new(listener));
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn viewport(&self) -> &ViewportTransform {
        &self.viewport
    }

    pub fn canvas(&self) -> &VirtualCanvas {
        &self.canvas
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn active_tool(&self) -> ToolKind {
        self.active
    }

    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn crop(&self) -> Option<&CropSession> {
        self.crop.as_ref()
    }

    pub fn is_cropping(&self) -> bool {
        self.crop.is_some()
    }

    pub fn editing_text(&self) -> Option<ObjectId> {
        self.editing_text
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Marquee rectangle being dragged, in scene coordinates.
    pub fn marquee(&self) -> Option<Rect> {
        self.marquee
    }

    /// No queued work and no replay outstanding.
    pub fn is_settled(&self) -> bool {
        self.tasks.is_empty() && self.parked.is_empty() && !self.history.is_replaying()
    }

    /// Whether the host should open an image picker. Cleared on read.
    pub fn take_image_request(&mut self) -> bool {
        std::mem::take(&mut self.image_requested)
    }

    /// Messages for the user, oldest first. Cleared on read.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Log a refused or failed operation and queue it for the user.
    pub fn report(&mut self, err: EditorError) {
        if err.is_precondition() {
            log::debug!("refused: {err}");
        } else {
            log::warn!("{err}");
        }
        self.notices.push(err.to_string());
    }

    // ─── Frame pump ──────────────────────────────────────────────────────

    /// Run queued work, then commit the pending snapshot if its debounce
    /// window has elapsed at `now`.
    pub fn pump(&mut self, now: Duration) {
        self.now = now;
        let mut queue: VecDeque<(Duration, Task)> = VecDeque::new();
        for Parked { since, task } in std::mem::take(&mut self.parked) {
            if now.saturating_sub(since) >= self.config.image_wait() {
                self.give_up(task);
            } else {
                queue.push_back((since, task));
            }
        }
        queue.extend(self.tasks.drain(..).map(|task| (now, task)));
        while let Some((since, task)) = queue.pop_front() {
            if let Some(task) = self.run(task) {
                self.parked.push(Parked { since, task });
            }
            // Replays queue image loads of their own.
            queue.extend(self.tasks.drain(..).map(|task| (now, task)));
        }
        if self.baseline_pending && !self.is_placing_images() {
            self.capture_baseline();
        }
        self.flush_events();
        if self.history.due(now) && !self.history.is_replaying() {
            self.commit_snapshot();
        }
    }

    /// Run one task. A task still waiting for its image bytes is handed
    /// back to be parked.
    fn run(&mut self, task: Task) -> Option<Task> {
        match task {
            Task::Replay(snapshot) => self.replay(&snapshot),
            Task::LoadImage { src, replay } => {
                match load_pixels(&mut self.images, self.loader.as_mut(), &src, None) {
                    Ok(_) => {}
                    Err(EditorError::ImagePending(_)) => {
                        return Some(Task::LoadImage { src, replay });
                    }
                    Err(e) => self.report(e),
                }
                if replay {
                    self.history.release();
                }
            }
            Task::PlaceImage {
                object,
                fallback,
                placement,
                select,
            } => {
                let src = object.image_src().unwrap_or_default().to_string();
                match load_pixels(
                    &mut self.images,
                    self.loader.as_mut(),
                    &src,
                    fallback.as_deref(),
                ) {
                    Ok(decoded) => {
                        let (w, h) = (decoded.width(), decoded.height());
                        self.place_image(*object, w, h, placement, select);
                    }
                    Err(EditorError::ImagePending(_)) => {
                        return Some(Task::PlaceImage {
                            object,
                            fallback,
                            placement,
                            select,
                        });
                    }
                    Err(e) => {
                        log::error!("could not place image {}", abbreviate(&src));
                        self.report(e);
                    }
                }
            }
        }
        None
    }

    /// Drop a parked task whose bytes never came.
    fn give_up(&mut self, task: Task) {
        let src = task.image_src().unwrap_or_default();
        log::error!("gave up waiting for image {}", abbreviate(src));
        let err = EditorError::LoadFailed(format!("{} did not arrive in time", abbreviate(src)));
        self.report(err);
        self.discard(task);
    }

    /// Forget a queued task, returning any replay hold it carried.
    fn discard(&mut self, task: Task) {
        if matches!(task, Task::Replay(_) | Task::LoadImage { replay: true, .. }) {
            self.history.release();
        }
    }

    /// Drop every queued and parked task.
    fn discard_all(&mut self) {
        let queued: Vec<Task> = self.tasks.drain(..).collect();
        let parked = std::mem::take(&mut self.parked);
        for task in queued.into_iter().chain(parked.into_iter().map(|p| p.task)) {
            self.discard(task);
        }
    }

    fn is_placing_images(&self) -> bool {
        self.tasks.iter().chain(self.parked.iter().map(|p| &p.task)).any(Task::places)
    }

    /// Remote sources the host still has to deliver, for
    /// `MemoryLoader::provide` or a failure report.
    pub fn pending_image_sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = Vec::new();
        let waiting = self.tasks.iter().chain(self.parked.iter().map(|p| &p.task));
        for src in waiting.filter_map(Task::image_src) {
            if !is_data_uri(src) && !self.images.contains(src) && !sources.iter().any(|s| s == src) {
                sources.push(src.to_string());
            }
        }
        sources
    }

    fn replay(&mut self, snapshot: &[u8]) {
        match decode_snapshot(snapshot) {
            Ok(restored) => {
                self.scene = restored;
                self.selection.clear();
                self.editing_text = None;
                let mut pending: Vec<String> = Vec::new();
                for src in self.scene.iter().filter_map(SceneObject::image_src) {
                    if !self.images.contains(src) && !pending.iter().any(|p| p == src) {
                        pending.push(src.to_string());
                    }
                }
                for src in pending {
                    self.history.hold();
                    self.tasks.push_back(Task::LoadImage { src, replay: true });
                }
            }
            Err(e) => self.report(e),
        }
        self.events.clear();
        self.history.release();
        self.refresh_editing();
    }

    fn place_image(
        &mut self,
        mut object: SceneObject,
        w: u32,
        h: u32,
        placement: Placement,
        select: bool,
    ) {
        if let ObjectKind::Image {
            natural_width,
            natural_height,
            ..
        } = &mut object.kind
        {
            *natural_width = w;
            *natural_height = h;
        }
        let (nw, nh) = (f64::from(w), f64::from(h));
        let t = &mut object.transform;
        match placement {
            Placement::Keep { rendered: None } => {}
            Placement::Keep {
                rendered: Some(size),
            } => {
                t.scale_x = size.width / nw;
                t.scale_y = size.height / nh;
            }
            Placement::Centered { center, width } => {
                let target = match width {
                    WidthRule::AtMost(max) => nw.min(max),
                    WidthRule::Inserted => self.config.inserted_image_width(nw),
                };
                let scale = target / nw;
                t.scale_x = scale;
                t.scale_y = scale;
                t.left = center.x - nw * scale / 2.0;
                t.top = center.y - nh * scale / 2.0;
            }
        }
        let id = object.id;
        self.apply(SceneMutation::Add {
            object: Box::new(object),
        });
        if select {
            self.set_selection([id]);
        }
    }

    // ─── History plumbing ────────────────────────────────────────────────

    fn capture_baseline(&mut self) {
        match encode_snapshot(&self.scene) {
            Ok(snapshot) => self.history.set_baseline(snapshot),
            Err(e) => self.report(e),
        }
        self.events.clear();
        self.history.take_pending();
        self.baseline_pending = false;
    }

    /// Turn structural events into snapshot requests. Events are held back
    /// while a pointer gesture is in progress.
    fn flush_events(&mut self) {
        if self.gesture.is_some() || self.events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.events);
        log::trace!("{} scene events", events.len());
        if !self.baseline_pending {
            self.history.request_snapshot(self.now);
        }
    }

    fn commit_snapshot(&mut self) {
        self.history.take_pending();
        match encode_snapshot(&self.scene) {
            Ok(snapshot) => self.history.commit(snapshot),
            Err(e) => self.report(e),
        }
    }

    /// Commit anything still waiting out its debounce window.
    fn flush_pending(&mut self) {
        self.flush_events();
        if self.history.is_pending() && !self.history.is_replaying() {
            self.commit_snapshot();
        }
    }

    /// Step back one history entry. The scene changes on the next pump.
    pub fn undo(&mut self) -> bool {
        self.leave_modes();
        self.flush_pending();
        match self.history.undo() {
            Some(snapshot) => {
                self.tasks.push_back(Task::Replay(snapshot));
                self.selection.clear();
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        self.leave_modes();
        self.flush_pending();
        match self.history.redo() {
            Some(snapshot) => {
                self.tasks.push_back(Task::Replay(snapshot));
                self.selection.clear();
                true
            }
            None => false,
        }
    }

    fn leave_modes(&mut self) {
        if let Some(crop) = self.crop.take() {
            crop.cancel(&mut self.scene);
        }
        self.editing_text = None;
        self.cancel_gesture();
        self.refresh_editing();
    }

    // ─── Scene plumbing ──────────────────────────────────────────────────

    fn apply(&mut self, mutation: SceneMutation) {
        let Some(event) = apply_mutation(&mut self.scene, mutation) else {
            return;
        };
        if let Some(crop) = &self.crop
            && crop.owns(event.id())
        {
            crop.constrain(&mut self.scene);
            return;
        }
        self.events.push(event);
    }

    fn set_selection(&mut self, ids: impl IntoIterator<Item = ObjectId>) {
        self.selection.clear();
        for id in ids {
            if self.scene.contains(id) && !self.selection.contains(&id) {
                self.selection.push(id);
            }
        }
    }

    fn single_selection(&self) -> Result<ObjectId, EditorError> {
        match self.selection.as_slice() {
            [] => Err(EditorError::NoSelection),
            [id] => Ok(*id),
            _ => Err(EditorError::MultipleSelection),
        }
    }

    fn refresh_editing(&mut self) {
        let on = self.gesture.is_some()
            || self.pan_anchor.is_some()
            || self.editing_text.is_some()
            || self.crop.is_some();
        if on != self.editing {
            self.editing = on;
            log::debug!("editing {}", if on { "started" } else { "ended" });
            if let Some(listener) = self.on_editing.as_mut() {
                listener(on);
            }
        }
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    pub fn pointer_down(&mut self, x: f64, y: f64, button: PointerButton, modifiers: Modifiers) {
        match button {
            PointerButton::Secondary => return,
            PointerButton::Middle => {
                self.begin_pan(x, y);
                return;
            }
            PointerButton::Primary if self.pan_armed => {
                self.begin_pan(x, y);
                return;
            }
            PointerButton::Primary => {}
        }
        if self.editing_text.is_some() {
            self.end_text_edit();
        }

        let p = self.viewport.screen_to_scene(Point::new(x, y));
        let tolerance = self.config.hit_tolerance / self.viewport.scale;
        let hit = hit_test(&self.scene, p, tolerance);
        let handle = match self.selection.as_slice() {
            [id] => self
                .scene
                .get(*id)
                .and_then(|obj| ResizeHandle::find(obj, p, tolerance)),
            _ => None,
        };

        let owner = if self.crop.is_some() {
            ToolKind::Select
        } else if self.active.yields_to_select() && (hit.is_some() || handle.is_some()) {
            ToolKind::Select
        } else {
            self.active
        };
        self.gesture = Some(owner);
        self.refresh_editing();

        let event = InputEvent::PointerDown {
            x: p.x,
            y: p.y,
            modifiers,
        };
        let out = self.run_tool(owner, &event, hit, handle);
        self.apply_output(out);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64, modifiers: Modifiers) {
        if self.pan_anchor.is_some() {
            self.pan_to(x, y);
            return;
        }
        let Some(owner) = self.gesture else {
            return;
        };
        let p = self.viewport.screen_to_scene(Point::new(x, y));
        let event = InputEvent::PointerMove {
            x: p.x,
            y: p.y,
            modifiers,
        };
        let out = self.run_tool(owner, &event, None, None);
        self.apply_output(out);
    }

    pub fn pointer_up(&mut self, x: f64, y: f64, modifiers: Modifiers) {
        if self.pan_anchor.is_some() {
            self.end_pan();
            return;
        }
        let Some(owner) = self.gesture else {
            return;
        };
        let p = self.viewport.screen_to_scene(Point::new(x, y));
        let event = InputEvent::PointerUp {
            x: p.x,
            y: p.y,
            modifiers,
        };
        let mut out = self.run_tool(owner, &event, None, None);
        let marquee = out.marquee.take();
        self.gesture = None;
        self.apply_output(out);

        if let Some(rect) = marquee {
            let hits = hit_test_rect(&self.scene, rect);
            if modifiers.shift {
                let mut merged: Vec<ObjectId> = self.selection.to_vec();
                merged.extend(hits);
                self.set_selection(merged);
            } else {
                self.set_selection(hits);
            }
        }
        self.marquee = None;
        self.flush_events();
        self.refresh_editing();
    }

    fn run_tool(
        &mut self,
        owner: ToolKind,
        event: &InputEvent,
        hit: Option<ObjectId>,
        handle: Option<ResizeHandle>,
    ) -> ToolOutput {
        let ctx = ToolContext {
            settings: &self.settings,
            hit,
            handle,
            selection: &self.selection[..],
            text_placeholder: &self.config.text_placeholder,
        };
        let tool: &mut dyn Tool = match owner {
            ToolKind::Select => &mut self.select_tool,
            ToolKind::Draw => &mut self.draw_tool,
            ToolKind::Text => &mut self.text_tool,
            ToolKind::Image => &mut self.image_tool,
            ToolKind::Rect
            | ToolKind::Circle
            | ToolKind::Line
            | ToolKind::Arrow
            | ToolKind::Highlight => &mut self.shape_tool,
        };
        tool.handle(event, &ctx)
    }

    fn apply_output(&mut self, out: ToolOutput) {
        for mutation in out.mutations {
            self.apply(mutation);
        }
        if let Some(selection) = out.select {
            self.set_selection(selection);
        }
        if out.marquee.is_some() {
            self.marquee = out.marquee;
        }
        if out.request_image {
            self.image_requested = true;
        }
        if out.finished {
            self.activate(ToolKind::Select);
        }
        if let Some(id) = out.edit_text
            && let Err(e) = self.begin_text_edit(id)
        {
            self.report(e);
        }
    }

    fn cancel_gesture(&mut self) {
        self.gesture = None;
        self.marquee = None;
        self.select_tool.reset();
        self.draw_tool.reset();
        self.shape_tool.reset();
    }

    // ─── Panning & zoom ──────────────────────────────────────────────────

    pub fn begin_pan(&mut self, x: f64, y: f64) {
        self.pan_anchor = Some(Point::new(x, y));
        self.refresh_editing();
    }

    pub fn pan_to(&mut self, x: f64, y: f64) {
        if let Some(anchor) = self.pan_anchor {
            self.viewport.pan(x - anchor.x, y - anchor.y);
            self.pan_anchor = Some(Point::new(x, y));
        }
    }

    pub fn end_pan(&mut self) {
        self.pan_anchor = None;
        self.refresh_editing();
    }

    fn screen_center(&self) -> Point {
        Point::new(self.screen.width / 2.0, self.screen.height / 2.0)
    }

    pub fn zoom_in(&mut self) -> f64 {
        let anchor = self.screen_center();
        self.viewport.zoom_in(anchor)
    }

    pub fn zoom_out(&mut self) -> f64 {
        let anchor = self.screen_center();
        self.viewport.zoom_out(anchor)
    }

    /// Back to 100% with the canvas centered.
    pub fn zoom_reset(&mut self) {
        self.viewport = ViewportTransform::centered(&self.canvas, self.screen);
    }

    pub fn wheel(&mut self, delta_y: f64, x: f64, y: f64) -> f64 {
        self.viewport.wheel(delta_y, Point::new(x, y))
    }

    /// The host viewport changed size.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.screen = Size::new(width, height);
        if self.canvas.resize(self.screen) {
            log::debug!(
                "virtual canvas resized to {}x{}",
                self.canvas.width,
                self.canvas.height
            );
        }
    }

    // ─── Tools & settings ────────────────────────────────────────────────

    /// Switch tools. Only the select tool is available while cropping.
    pub fn set_tool(&mut self, tool: ToolKind) -> bool {
        if self.crop.is_some() && tool != ToolKind::Select {
            log::debug!("tool change to {tool:?} ignored while cropping");
            return false;
        }
        self.cancel_gesture();
        self.activate(tool);
        if tool == ToolKind::Image {
            self.image_requested = true;
        }
        if tool == ToolKind::Draw {
            self.selection.clear();
        }
        self.refresh_editing();
        true
    }

    /// Make `tool` current without touching the gesture in progress.
    fn activate(&mut self, tool: ToolKind) {
        self.active = tool;
        if let Some(shape) = tool.shape() {
            self.shape_tool.set_shape(shape);
        }
        self.settings.tool = tool;
        self.persist_setting(SettingKey::Tool);
        log::debug!("tool: {tool:?}");
    }

    fn persist_setting(&mut self, key: SettingKey) {
        if let Some(store) = self.store.as_mut() {
            self.settings.save(store.as_mut(), key);
        }
    }

    /// Brush color. Also recolors the selection: text and highlights by
    /// fill, everything else by stroke.
    pub fn set_drawing_color(&mut self, color: Color) {
        self.settings.drawing_color = color;
        self.persist_setting(SettingKey::DrawingColor);
        self.restyle_selection(|obj| match &mut obj.kind {
            ObjectKind::Text { .. } | ObjectKind::HighlightRect { .. } => {
                obj.style.fill = color;
                true
            }
            ObjectKind::Image { .. } => false,
            ObjectKind::ArrowGroup { children } => {
                for child in children.iter_mut() {
                    child.style.stroke = color;
                }
                true
            }
            _ => {
                obj.style.stroke = color;
                true
            }
        });
    }

    pub fn set_drawing_width(&mut self, width: f64) {
        if width.is_nan() || width <= 0.0 {
            return;
        }
        self.settings.drawing_width = width;
        self.persist_setting(SettingKey::DrawingWidth);
        self.restyle_selection(|obj| match &mut obj.kind {
            ObjectKind::Text { .. } | ObjectKind::HighlightRect { .. } | ObjectKind::Image { .. } => {
                false
            }
            ObjectKind::ArrowGroup { children } => {
                for child in children.iter_mut() {
                    child.style.stroke_width = width;
                }
                true
            }
            _ => {
                obj.style.stroke_width = width;
                true
            }
        });
    }

    pub fn set_font_family(&mut self, family: &str) {
        self.settings.font_family = family.to_string();
        self.persist_setting(SettingKey::FontFamily);
        self.restyle_selection(|obj| match &mut obj.kind {
            ObjectKind::Text { font_family, .. } => {
                *font_family = family.to_string();
                true
            }
            _ => false,
        });
    }

    pub fn set_font_size(&mut self, size: f64) {
        if size.is_nan() || size <= 0.0 {
            return;
        }
        self.settings.font_size = size;
        self.persist_setting(SettingKey::FontSize);
        self.restyle_selection(|obj| match &mut obj.kind {
            ObjectKind::Text { font_size, .. } => {
                *font_size = size;
                true
            }
            _ => false,
        });
    }

    fn restyle_selection(&mut self, mut restyle: impl FnMut(&mut SceneObject) -> bool) {
        for id in self.selection.clone() {
            if let Some(obj) = self.scene.get_mut(id)
                && restyle(obj)
            {
                self.events.push(SceneEvent::Modified(id));
            }
        }
        self.flush_events();
    }

    // ─── Text ────────────────────────────────────────────────────────────

    pub fn begin_text_edit(&mut self, id: ObjectId) -> Result<(), EditorError> {
        match self.scene.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Text { .. }) => {
                self.editing_text = Some(id);
                self.set_selection([id]);
                self.refresh_editing();
                Ok(())
            }
            Some(_) => Err(EditorError::NotText),
            None => Err(EditorError::NoSelection),
        }
    }

    /// Replace the content of the text being edited (or the selected text).
    pub fn set_text(&mut self, content: &str) -> Result<(), EditorError> {
        let id = match self.editing_text {
            Some(id) => id,
            None => self.single_selection()?,
        };
        let obj = self.scene.get_mut(id).ok_or(EditorError::NoSelection)?;
        let ObjectKind::Text { text, .. } = &mut obj.kind else {
            return Err(EditorError::NotText);
        };
        if text != content {
            *text = content.to_string();
            self.events.push(SceneEvent::Modified(id));
            self.flush_events();
        }
        Ok(())
    }

    pub fn end_text_edit(&mut self) {
        if self.editing_text.take().is_some() {
            self.refresh_editing();
        }
    }

    // ─── Object operations ───────────────────────────────────────────────

    pub fn delete_selection(&mut self) -> Result<usize, EditorError> {
        if self.crop.is_some() {
            return Err(EditorError::CropActive);
        }
        if self.selection.is_empty() {
            return Err(if self.scene.is_empty() {
                EditorError::EmptyScene
            } else {
                EditorError::NoSelection
            });
        }
        let ids: Vec<ObjectId> = self.selection.drain(..).collect();
        let mut removed = 0;
        for id in ids {
            if self.scene.remove(id).is_some() {
                self.events.push(SceneEvent::Removed(id));
                removed += 1;
            }
        }
        if self.editing_text.is_some_and(|id| !self.scene.contains(id)) {
            self.end_text_edit();
        }
        self.flush_events();
        Ok(removed)
    }

    /// Remove everything and reset the background.
    pub fn clear(&mut self) {
        if let Some(crop) = self.crop.take() {
            crop.cancel(&mut self.scene);
        }
        self.editing_text = None;
        self.cancel_gesture();
        self.tasks.retain(|t| !t.places());
        self.parked.retain(|p| !p.task.places());
        let ids: Vec<ObjectId> = self.scene.iter().map(|o| o.id).collect();
        self.scene.clear();
        self.scene.background = Color::WHITE;
        self.selection.clear();
        self.events.extend(ids.into_iter().map(SceneEvent::Removed));
        if self.events.is_empty() {
            // Background reset alone still counts as a change
            self.history.request_snapshot(self.now);
        }
        self.flush_events();
        self.refresh_editing();
    }

    pub fn set_background(&mut self, color: Color) {
        if self.scene.background != color {
            self.scene.background = color;
            self.history.request_snapshot(self.now);
        }
    }

    fn reorder_selection(&mut self, op: fn(&mut Scene, ObjectId) -> bool) -> Result<(), EditorError> {
        if self.crop.is_some() {
            return Err(EditorError::CropActive);
        }
        if self.selection.is_empty() {
            return Err(EditorError::NoSelection);
        }
        for id in self.selection.clone() {
            if op(&mut self.scene, id) {
                self.events.push(SceneEvent::Modified(id));
            }
        }
        self.flush_events();
        Ok(())
    }

    pub fn bring_to_front(&mut self) -> Result<(), EditorError> {
        self.reorder_selection(Scene::bring_to_front)
    }

    pub fn send_to_back(&mut self) -> Result<(), EditorError> {
        self.reorder_selection(Scene::send_to_back)
    }

    pub fn bring_forward(&mut self) -> Result<(), EditorError> {
        self.reorder_selection(Scene::bring_forward)
    }

    pub fn send_backward(&mut self) -> Result<(), EditorError> {
        self.reorder_selection(Scene::send_backward)
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    fn source_pixels(&mut self, id: ObjectId) -> Option<annot_render::DecodedImage> {
        let src = self.scene.get(id)?.image_src()?.to_string();
        load_pixels(&mut self.images, self.loader.as_mut(), &src, None).ok()
    }

    pub fn copy(&mut self) -> Result<(), EditorError> {
        let id = self.single_selection()?;
        let pixels = self.source_pixels(id);
        let obj = self.scene.get(id).ok_or(EditorError::NoSelection)?;
        let input = ExtractionInput {
            object: obj,
            scene: &self.scene,
            images: &self.images,
            fonts: &self.fonts,
            pixels: pixels.as_ref(),
        };
        let entry = capture(&input, &copy_strategies(), self.config.min_pixel_payload)?;
        self.clipboard.store(entry);
        log::debug!("copied {id}");
        Ok(())
    }

    pub fn cut(&mut self) -> Result<(), EditorError> {
        self.copy()?;
        self.delete_selection().map(|_| ())
    }

    /// Paste the clipboard entry, cascading each paste further from the
    /// original. Image pastes appear once their pixels have loaded.
    pub fn paste(&mut self) -> Result<ObjectId, EditorError> {
        if self.crop.is_some() {
            return Err(EditorError::CropActive);
        }
        let entry = self.clipboard.peek().ok_or(EditorError::ClipboardEmpty)?;
        let n = self.clipboard.next_paste();
        let object = entry.instantiate(self.config.paste_offset * f64::from(n));
        Ok(self.insert_copy(object, entry.rendered_size(), None))
    }

    /// Copy and paste the selected object in one step, without touching
    /// the clipboard.
    pub fn duplicate(&mut self) -> Result<ObjectId, EditorError> {
        if self.crop.is_some() {
            return Err(EditorError::CropActive);
        }
        let id = self.single_selection()?;
        let pixels = self.source_pixels(id);
        let obj = self.scene.get(id).ok_or(EditorError::NoSelection)?;
        let fallback = obj.image_src().map(str::to_string);
        let input = ExtractionInput {
            object: obj,
            scene: &self.scene,
            images: &self.images,
            fonts: &self.fonts,
            pixels: pixels.as_ref(),
        };
        let entry = capture(&input, &duplicate_strategies(), self.config.min_pixel_payload)?;
        let object = entry.instantiate(self.config.paste_offset);
        Ok(self.insert_copy(object, entry.rendered_size(), fallback))
    }

    fn insert_copy(
        &mut self,
        object: SceneObject,
        rendered: Option<Size>,
        fallback: Option<String>,
    ) -> ObjectId {
        let id = object.id;
        if object.is_image() {
            self.tasks.push_back(Task::PlaceImage {
                object: Box::new(object),
                fallback,
                placement: Placement::Keep { rendered },
                select: true,
            });
        } else {
            self.apply(SceneMutation::Add {
                object: Box::new(object),
            });
            self.set_selection([id]);
            self.flush_events();
        }
        id
    }

    // ─── Crop ────────────────────────────────────────────────────────────

    pub fn start_crop(&mut self) -> Result<(), EditorError> {
        if self.crop.is_some() {
            return Err(EditorError::CropActive);
        }
        let id = self.single_selection()?;
        if !self.scene.get(id).is_some_and(SceneObject::is_image) {
            return Err(EditorError::NotAnImage);
        }
        self.cancel_gesture();
        self.editing_text = None;
        self.set_tool(ToolKind::Select);
        let crop = CropSession::begin(&mut self.scene, id, &self.config)?;
        self.selection.clear();
        self.selection.push(crop.rect_id());
        self.crop = Some(crop);
        self.refresh_editing();
        Ok(())
    }

    pub fn apply_crop(&mut self) -> Result<ObjectId, EditorError> {
        let crop = self.crop.as_ref().ok_or(EditorError::CropInactive)?;
        let src = self
            .scene
            .get(crop.image())
            .and_then(SceneObject::image_src)
            .map(str::to_string)
            .ok_or(EditorError::CropInactive)?;
        let pixels = load_pixels(&mut self.images, self.loader.as_mut(), &src, None)?;
        let replacement = match &self.crop {
            Some(crop) => crop.build_cropped(&self.scene, &pixels)?,
            None => return Err(EditorError::CropInactive),
        };
        let cropped_src = replacement.image_src().map(str::to_string);
        let Some(crop) = self.crop.take() else {
            return Err(EditorError::CropInactive);
        };
        let original = crop.image();
        let id = crop.finish(&mut self.scene, replacement);
        if let Some(src) = cropped_src {
            self.tasks.push_back(Task::LoadImage { src, replay: false });
        }
        self.events.push(SceneEvent::Removed(original));
        self.events.push(SceneEvent::Added(id));
        self.set_selection([id]);
        self.flush_events();
        self.refresh_editing();
        Ok(id)
    }

    pub fn cancel_crop(&mut self) -> Result<(), EditorError> {
        let crop = self.crop.take().ok_or(EditorError::CropInactive)?;
        let image = crop.cancel(&mut self.scene);
        self.set_selection([image]);
        self.cancel_gesture();
        self.refresh_editing();
        Ok(())
    }

    // ─── Images & content ────────────────────────────────────────────────

    /// Add an uploaded image centered in the visible area.
    pub fn insert_image(&mut self, src: impl Into<String>) {
        let object = SceneObject::fresh(ObjectKind::Image {
            src: src.into(),
            natural_width: 0,
            natural_height: 0,
        });
        let center = self.viewport.visible_rect(self.screen).center();
        self.tasks.push_back(Task::PlaceImage {
            object: Box::new(object),
            fallback: None,
            placement: Placement::Centered {
                center,
                width: WidthRule::Inserted,
            },
            select: true,
        });
        if self.crop.is_none() {
            self.set_tool(ToolKind::Select);
        }
    }

    /// Replace the scene with saved content. The history restarts from the
    /// loaded state once its images have been processed.
    pub fn load_content(&mut self, content: PersistedContent) {
        if let Some(crop) = self.crop.take() {
            crop.cancel(&mut self.scene);
        }
        self.cancel_gesture();
        self.editing_text = None;
        self.selection.clear();
        self.discard_all();
        self.events.clear();

        match content {
            PersistedContent::Document(doc) => {
                if let (Some(w), Some(h)) = (doc.canvas_width, doc.canvas_height) {
                    self.canvas = VirtualCanvas::restored(w, h, self.screen);
                }
                self.viewport = doc
                    .viewport_transform
                    .unwrap_or_else(|| ViewportTransform::centered(&self.canvas, self.screen));
                self.scene = doc.into_scene();
                let mut sources: Vec<String> = Vec::new();
                for src in self.scene.iter().filter_map(SceneObject::image_src) {
                    if !sources.iter().any(|s| s == src) {
                        sources.push(src.to_string());
                    }
                }
                for src in sources {
                    self.tasks.push_back(Task::LoadImage { src, replay: false });
                }
                log::debug!("loaded document with {} objects", self.scene.len());
            }
            PersistedContent::ImageRef { image_url } => {
                self.scene = Scene::new();
                let object = SceneObject::fresh(ObjectKind::Image {
                    src: image_url,
                    natural_width: 0,
                    natural_height: 0,
                });
                self.tasks.push_back(Task::PlaceImage {
                    object: Box::new(object),
                    fallback: None,
                    placement: Placement::Centered {
                        center: self.canvas.center(),
                        width: WidthRule::AtMost(self.config.loaded_image_max_width),
                    },
                    select: false,
                });
                log::debug!("loaded image-only description");
            }
        }
        self.baseline_pending = true;
        self.refresh_editing();
    }

    /// Parse and load stored JSON. Unreadable content leaves an empty
    /// canvas and is reported.
    pub fn load_json(&mut self, json: &str) -> Result<(), EditorError> {
        match PersistedContent::from_json(json) {
            Ok(content) => {
                self.load_content(content);
                Ok(())
            }
            Err(e) => {
                self.load_content(PersistedContent::Document(
                    annot_core::CanvasDocument::minimal(),
                ));
                Err(e.into())
            }
        }
    }

    // ─── Keyboard ────────────────────────────────────────────────────────

    /// Resolve and run a key press. Returns the action taken, if any.
    pub fn handle_key(
        &mut self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let cx = KeyContext {
            cropping: self.crop.is_some(),
            editing_text: self.editing_text.is_some(),
        };
        let action = ShortcutMap::resolve(key, ctrl, shift, alt, meta, cx)?;
        let result = match action {
            ShortcutAction::Tool(tool) => {
                self.set_tool(tool);
                Ok(())
            }
            ShortcutAction::Undo => {
                self.undo();
                Ok(())
            }
            ShortcutAction::Redo => {
                self.redo();
                Ok(())
            }
            ShortcutAction::Copy => self.copy(),
            ShortcutAction::Cut => self.cut(),
            ShortcutAction::Paste => self.paste().map(|_| ()),
            ShortcutAction::Duplicate => self.duplicate().map(|_| ()),
            ShortcutAction::Delete if self.selection.is_empty() => Ok(()),
            ShortcutAction::Delete => self.delete_selection().map(|_| ()),
            ShortcutAction::BringToFront => self.bring_to_front(),
            ShortcutAction::SendToBack => self.send_to_back(),
            ShortcutAction::ZoomIn => {
                self.zoom_in();
                Ok(())
            }
            ShortcutAction::ZoomOut => {
                self.zoom_out();
                Ok(())
            }
            ShortcutAction::ZoomReset => {
                self.zoom_reset();
                Ok(())
            }
            ShortcutAction::PanStart => {
                self.pan_armed = true;
                Ok(())
            }
            ShortcutAction::Cancel => {
                if self.editing_text.is_some() {
                    self.end_text_edit();
                    Ok(())
                } else if self.crop.is_some() {
                    self.cancel_crop()
                } else {
                    self.selection.clear();
                    Ok(())
                }
            }
            ShortcutAction::ApplyCrop => self.apply_crop().map(|_| ()),
        };
        if let Err(e) = result {
            self.report(e);
        }
        Some(action)
    }

    pub fn key_up(&mut self, key: &str) {
        if key == " " {
            self.pan_armed = false;
        }
    }

    // ─── Output ──────────────────────────────────────────────────────────

    /// The scene as it should be saved: crop guides gone and frozen objects
    /// back to normal.
    fn settled_scene(&self) -> std::borrow::Cow<'_, Scene> {
        match &self.crop {
            Some(crop) => {
                let mut scene = self.scene.clone();
                crop.clone().cancel(&mut scene);
                std::borrow::Cow::Owned(scene)
            }
            None => std::borrow::Cow::Borrowed(&self.scene),
        }
    }

    /// PNG of everything on the canvas, cropped to the content.
    pub fn export_png(&self) -> Result<Vec<u8>, EditorError> {
        let scene = self.settled_scene();
        let bounds = content_bounds(&scene).ok_or(EditorError::EmptyScene)?;
        let img = render_region(&scene, &self.images, &self.fonts, bounds, 1.0)?;
        Ok(encode_png(&img)?)
    }

    /// Register a font face for text rendering. The first face registered
    /// also stands in for families nobody provided.
    pub fn provide_font(&mut self, family: &str, bytes: Vec<u8>) -> Result<(), EditorError> {
        Ok(self.fonts.insert(family, bytes)?)
    }

    /// Text objects laid out for a host that draws text itself, in screen
    /// coordinates.
    pub fn text_runs(&self) -> Vec<TextRun> {
        text_runs(&self.scene, self.viewport.affine())
    }

    /// The visible viewport, including the stroke being drawn and the
    /// marquee.
    pub fn render_view(&self) -> Result<RgbaImage, EditorError> {
        self.paint_view(Some(&self.fonts))
    }

    /// [`render_view`](Self::render_view) without text, for hosts that
    /// draw [`text_runs`](Self::text_runs) on top.
    pub fn render_view_shapes(&self) -> Result<RgbaImage, EditorError> {
        self.paint_view(None)
    }

    fn paint_view(&self, fonts: Option<&FontBook>) -> Result<RgbaImage, EditorError> {
        let mut extra: Vec<SceneObject> = self.draw_tool.preview().into_iter().collect();
        if let Some(rect) = self.marquee {
            let mut outline = SceneObject::new(
                ObjectId::intern("__marquee"),
                ObjectKind::Rect {
                    width: rect.width(),
                    height: rect.height(),
                },
            )
            .at(rect.x0, rect.y0)
            .with_style(ObjectStyle {
                dash: Some([4.0, 4.0]),
                fill: Color::rgba(0.2, 0.5, 1.0, 0.1),
                ..ObjectStyle::stroked(Color::rgba(0.2, 0.5, 1.0, 1.0), 1.0 / self.viewport.scale)
            });
            outline.set_interactive(false);
            extra.push(outline);
        }
        let width = self.screen.width.max(1.0).round() as u32;
        let height = self.screen.height.max(1.0).round() as u32;
        Ok(render_view(
            &self.scene,
            &self.images,
            fonts,
            &self.viewport,
            width,
            height,
            &extra,
        )?)
    }

    /// Decide what a save would write right now.
    pub fn plan_save(&self) -> Result<SavePlan, EditorError> {
        let placing = self.tasks.iter().chain(self.parked.iter().map(|p| &p.task));
        if let Some(src) = placing.filter(|t| t.places()).find_map(Task::image_src) {
            log::debug!("save refused while {} loads", abbreviate(src));
            return Err(EditorError::ImagePending(src.to_string()));
        }
        persist::plan_save(
            &self.settled_scene(),
            &self.images,
            &self.fonts,
            &self.canvas,
            &self.viewport,
            &self.config,
        )
    }

    /// Save through the given services. The scene is not modified, whether
    /// or not the save succeeds.
    pub async fn save<U, C>(&self, upload: &U, sink: &C) -> Result<SaveOutcome, EditorError>
    where
        U: UploadService,
        C: ContentSink,
    {
        let plan = self.plan_save()?;
        persist::execute_save(plan, upload, sink).await
    }
}
