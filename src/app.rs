use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use eframe::egui;

use crate::classify::{classify, ScanOptions};
use crate::copy::resolve_and_copy;
use crate::dicom::{format_records, inspect};
use crate::error::SortError;
use crate::tree::{NodeId, NodeKind, SeriesTree, TreeNode};

pub const APP_TITLE: &str = "DICOM Sort";
pub const INITIAL_WINDOW_SIZE: [f32; 2] = [800.0, 600.0];
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const NAME_COLUMN_WIDTH: f32 = 300.0;
const DETAIL_WINDOW_SIZE: [f32; 2] = [720.0, 520.0];
const COPY_SUCCESS_MESSAGE: &str = "Selected files have been copied.";

struct DetailWindow {
    id: u64,
    title: String,
    text: String,
    open: bool,
}

enum TreeAction {
    Select { id: NodeId, toggle: bool },
    Inspect(NodeId),
}

pub struct DicomSortApp {
    tree: SeriesTree,
    /// Bumped on every load so collapse state from the previous tree is not reused.
    tree_generation: u64,
    selection: BTreeSet<NodeId>,
    detail_windows: Vec<DetailWindow>,
    next_detail_id: u64,
    scan_options: ScanOptions,
    status_line: String,
}

impl Default for DicomSortApp {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

impl DicomSortApp {
    pub fn new(scan_options: ScanOptions) -> Self {
        Self {
            tree: SeriesTree::default(),
            tree_generation: 0,
            selection: BTreeSet::new(),
            detail_windows: Vec::new(),
            next_detail_id: 0,
            scan_options,
            status_line: String::new(),
        }
    }

    fn browse_and_load(&mut self) {
        let picked = rfd::FileDialog::new()
            .set_title("Select Folder with DICOM Files")
            .pick_folder();

        match picked {
            Some(folder) => {
                if let Err(err) = self.load_folder(&folder) {
                    show_error(&format!("An error occurred: {err:#}"));
                }
            }
            None => show_error("Please select a folder."),
        }
    }

    fn load_folder(&mut self, folder: &Path) -> Result<()> {
        self.tree = SeriesTree::default();
        self.selection.clear();
        self.tree_generation = self.tree_generation.wrapping_add(1);

        let outcome = classify(folder, &self.scan_options)
            .with_context(|| format!("Could not classify {}", folder.display()));
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.status_line = format!("Load failed: {err:#}");
                return Err(err);
            }
        };

        self.tree = SeriesTree::render(&outcome.grouping);
        self.status_line = if outcome.grouping.is_empty() {
            format!("No DICOM files found in {}", folder.display())
        } else {
            format!(
                "Loaded {} files from {} ({} skipped)",
                outcome.grouping.file_count(),
                folder.display(),
                outcome.skipped
            )
        };
        Ok(())
    }

    fn apply_selection(&mut self, id: NodeId, toggle: bool) {
        if toggle {
            if !self.selection.remove(&id) {
                self.selection.insert(id);
            }
        } else {
            self.selection.clear();
            self.selection.insert(id);
        }
    }

    fn selected_nodes(&self) -> Vec<NodeId> {
        self.selection.iter().copied().collect()
    }

    fn copy_selected_files(&mut self) {
        if self.selection.is_empty() {
            show_error(&SortError::NoSelection.to_string());
            return;
        }

        let destination = rfd::FileDialog::new()
            .set_title("Choose Target Folder")
            .pick_folder();
        match self.copy_selection_to(destination.as_deref()) {
            Ok(copied) => show_info("Success", &copy_success_message(copied)),
            Err(err) => show_error(&format!("{err:#}")),
        }
    }

    fn copy_selection_to(&mut self, destination: Option<&Path>) -> Result<usize> {
        let copied = resolve_and_copy(&self.tree, &self.selected_nodes(), destination)?;
        if let Some(destination) = destination {
            self.status_line = format!("Copied {copied} files to {}", destination.display());
        }
        Ok(copied)
    }

    fn open_details(&mut self, path: &Path) {
        match self.details_window_for(path) {
            Ok(window) => self.detail_windows.push(window),
            Err(err) => show_error(&format!("{err:#}")),
        }
    }

    fn details_window_for(&mut self, path: &Path) -> Result<DetailWindow> {
        let records =
            inspect(path).with_context(|| format!("Could not read details of {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let id = self.next_detail_id;
        self.next_detail_id = self.next_detail_id.wrapping_add(1);
        Ok(DetailWindow {
            id,
            title: format!("Details for {file_name}"),
            text: format_records(&records),
            open: true,
        })
    }

    fn apply_tree_actions(&mut self, actions: Vec<TreeAction>) {
        for action in actions {
            match action {
                TreeAction::Select { id, toggle } => self.apply_selection(id, toggle),
                TreeAction::Inspect(id) => {
                    let path = self.tree.payload(id).map(Path::to_path_buf);
                    if let Some(path) = path {
                        self.open_details(&path);
                    }
                }
            }
        }
    }

    fn show_tree(&self, ui: &mut egui::Ui) -> Vec<TreeAction> {
        let mut actions = Vec::new();

        ui.horizontal(|ui| {
            ui.allocate_ui_with_layout(
                egui::vec2(NAME_COLUMN_WIDTH, ui.spacing().interact_size.y),
                egui::Layout::left_to_right(egui::Align::Center),
                |ui| {
                    ui.strong("Name");
                },
            );
            ui.strong("Information");
        });
        ui.separator();

        egui::ScrollArea::both()
            .id_salt("series-tree")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for &child in self.tree.children(self.tree.root()) {
                    show_tree_node(
                        ui,
                        &self.tree,
                        child,
                        self.tree_generation,
                        &self.selection,
                        &mut actions,
                    );
                }
            });

        actions
    }

    fn show_detail_windows(&mut self, ctx: &egui::Context) {
        for window in &mut self.detail_windows {
            egui::Window::new(window.title.as_str())
                .id(egui::Id::new(("detail-window", window.id)))
                .open(&mut window.open)
                .default_size(DETAIL_WINDOW_SIZE)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .show(ui, |ui| {
                            ui.add(
                                egui::TextEdit::multiline(&mut window.text.as_str())
                                    .font(egui::TextStyle::Monospace)
                                    .desired_width(f32::INFINITY),
                            );
                        });
                });
        }
        self.detail_windows.retain(|window| window.open);
    }
}

impl eframe::App for DicomSortApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut load_clicked = false;
        let mut copy_clicked = false;

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                ui.label("Click Load to Select Folder with DICOM Files:");
                load_clicked = ui.button("Load").clicked();
                ui.add_space(25.0);
                ui.label("Hold down Ctrl to Select Files and Choose Target Folder:");
                copy_clicked = ui.button("Copy Selection").clicked();
            });
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(self.status_line.as_str());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.weak(format!("{APP_TITLE} v{APP_VERSION}"));
                    if !self.selection.is_empty() {
                        ui.weak(format!("{} selected", self.selection.len()));
                    }
                });
            });
        });

        let mut actions = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.tree.is_empty() {
                ui.allocate_ui_with_layout(
                    ui.available_size(),
                    egui::Layout::centered_and_justified(egui::Direction::TopDown),
                    |ui| {
                        ui.label("Load a folder to list its DICOM files.");
                    },
                );
            } else {
                actions = self.show_tree(ui);
            }
        });

        self.show_detail_windows(ctx);
        self.apply_tree_actions(actions);

        // Native dialogs block until closed.
        if load_clicked {
            self.browse_and_load();
        }
        if copy_clicked {
            self.copy_selected_files();
        }
    }
}

fn show_tree_node(
    ui: &mut egui::Ui,
    tree: &SeriesTree,
    id: NodeId,
    generation: u64,
    selection: &BTreeSet<NodeId>,
    actions: &mut Vec<TreeAction>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let selected = selection.contains(&id);

    if node.is_leaf() {
        ui.horizontal(|ui| {
            let response = show_node_row(ui, node, selected);
            record_node_response(ui, &response, id, node, actions);
        });
        return;
    }

    let state_id = ui.make_persistent_id(("series-tree-node", generation, id));
    egui::collapsing_header::CollapsingState::load_with_default_open(ui.ctx(), state_id, false)
        .show_header(ui, |ui| {
            let response = show_node_row(ui, node, selected);
            record_node_response(ui, &response, id, node, actions);
        })
        .body(|ui| {
            for &child in node.children() {
                show_tree_node(ui, tree, child, generation, selection, actions);
            }
        });
}

fn show_node_row(ui: &mut egui::Ui, node: &TreeNode, selected: bool) -> egui::Response {
    let response = ui
        .allocate_ui_with_layout(
            egui::vec2(NAME_COLUMN_WIDTH, ui.spacing().interact_size.y),
            egui::Layout::left_to_right(egui::Align::Center),
            |ui| ui.selectable_label(selected, node.label.as_str()),
        )
        .inner;
    ui.weak(node.info.as_str());
    response
}

fn record_node_response(
    ui: &egui::Ui,
    response: &egui::Response,
    id: NodeId,
    node: &TreeNode,
    actions: &mut Vec<TreeAction>,
) {
    if response.double_clicked() && node.kind == NodeKind::File {
        actions.push(TreeAction::Inspect(id));
    } else if response.clicked() {
        let toggle = ui.input(|input| input.modifiers.command);
        actions.push(TreeAction::Select { id, toggle });
    }
}

fn copy_success_message(copied: usize) -> String {
    let noun = if copied == 1 { "file" } else { "files" };
    format!("{COPY_SUCCESS_MESSAGE}\n{copied} {noun} copied.")
}

fn show_error(message: &str) {
    log::error!("{message}");
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Error)
        .set_title("Error")
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}

fn show_info(title: &str, message: &str) {
    log::info!("{message}");
    let _ = rfd::MessageDialog::new()
        .set_level(rfd::MessageLevel::Info)
        .set_title(title)
        .set_description(message)
        .set_buttons(rfd::MessageButtons::Ok)
        .show();
}
