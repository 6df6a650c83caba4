use imgui::{im_str, ChildWindow, Condition, ImString, Ui, Window};
use voortman3d_backend_vulkan::Renderer;
use voortman3d_core::scene::Model;

/// A change requested through the overlay, applied once the frame is submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayAction {
    ShowAll,
    HideAll,
    SetWireframe(bool),
    Reload,
    SetNodeVisible(usize, bool),
    SetSawHeight(f32),
}

struct NodeEntry {
    index: usize,
    label: ImString,
}

pub struct Overlay {
    title: ImString,
    entries: Vec<NodeEntry>,
    pub saw_height: f32,
}

impl Overlay {
    pub fn new(title: &str, model: &Model) -> Self {
        Self {
            title: ImString::new(title),
            entries: node_entries(model),
            saw_height: 0.0,
        }
    }

    /// Rebuilds the node list after the model was replaced.
    pub fn refresh(&mut self, model: &Model) {
        self.entries = node_entries(model);
    }

    pub fn build(&self, ui: &Ui, renderer: &Renderer) -> Vec<OverlayAction> {
        let mut actions = Vec::new();
        let mut saw_height = self.saw_height;

        Window::new(&self.title)
            .position([10.0, 10.0], Condition::FirstUseEver)
            .size([260.0, 560.0], Condition::FirstUseEver)
            .build(ui, || {
                let framerate = ui.io().framerate;
                ui.text(format!(
                    "{:.2} ms/frame ({:.1} fps)",
                    1000.0 / framerate.max(f32::EPSILON),
                    framerate
                ));
                ui.text(format!("Nodes: {}", renderer.model().node_count()));
                if !renderer.conditional_rendering_enabled() {
                    ui.text_disabled("Conditional rendering unavailable");
                }
                ui.separator();

                if ui
                    .collapsing_header(im_str!("Visibility"))
                    .default_open(true)
                    .build()
                {
                    if ui.button(im_str!("All"), [0.0, 0.0]) {
                        actions.push(OverlayAction::ShowAll);
                    }
                    ui.same_line(0.0);
                    if ui.button(im_str!("None"), [0.0, 0.0]) {
                        actions.push(OverlayAction::HideAll);
                    }

                    if renderer.supports_wireframe() {
                        let mut wireframe = renderer.wireframe();
                        if ui.checkbox(im_str!("Wireframe"), &mut wireframe) {
                            actions.push(OverlayAction::SetWireframe(wireframe));
                        }
                    }

                    if ui.button(im_str!("Reload"), [0.0, 0.0]) {
                        actions.push(OverlayAction::Reload);
                    }

                    ui.input_float(im_str!("Saw Height"), &mut saw_height).build();

                    ui.spacing();

                    let visibility = renderer.visibility();
                    ChildWindow::new(im_str!("Nodes"))
                        .size([0.0, 400.0])
                        .border(true)
                        .build(ui, || {
                            for entry in self.entries.iter() {
                                let mut visible = visibility.is_visible(entry.index);
                                if ui.checkbox(&entry.label, &mut visible) {
                                    actions.push(OverlayAction::SetNodeVisible(
                                        entry.index,
                                        visible,
                                    ));
                                }
                            }
                        });
                }
            });

        if saw_height != self.saw_height {
            actions.push(OverlayAction::SetSawHeight(saw_height));
        }
        actions
    }
}

/// One checkbox per node that carries a mesh, in node index order.
fn node_entries(model: &Model) -> Vec<NodeEntry> {
    model
        .meshes()
        .map(|(node, mesh)| NodeEntry {
            index: node.index,
            label: ImString::new(format!("[{}] {}", node.index, mesh.name)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use voortman3d_core::scene::LoadOptions;

    fn saw_station() -> Model {
        let path =
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../assets/models/saw_station.gltf");
        Model::load(path, LoadOptions::default()).expect("Failed to load test asset")
    }

    #[test]
    fn entries_list_meshed_nodes_by_index() {
        let entries = node_entries(&saw_station());
        let labels = entries
            .iter()
            .map(|entry| entry.label.to_str().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            labels,
            vec![
                "[0] FrameBeam",
                "[2] SawHousing",
                "[3] SawBlade",
                "[4] TableTop"
            ]
        );
        let indices = entries.iter().map(|entry| entry.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 2, 3, 4]);
    }

    #[test]
    fn refresh_follows_the_replaced_model() {
        let mut overlay = Overlay::new("Voortman3D", &saw_station());
        assert_eq!(overlay.entries.len(), 4);
        overlay.refresh(&Model::default());
        assert!(overlay.entries.is_empty());
    }
}
