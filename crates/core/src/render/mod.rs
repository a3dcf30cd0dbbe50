use serde::{Deserialize, Serialize};

use crate::{camera::CameraPose, math::Transform, Result};

/// Handle to a node owned by a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Rendering collaborator. The engine only creates nodes at scene
/// construction and afterwards sets transforms, visibility and the camera.
pub trait Scene {
    fn spawn(&mut self, name: &str) -> NodeId;
    fn set_transform(&mut self, node: NodeId, transform: Transform);
    fn set_visible(&mut self, node: NodeId, visible: bool);
    fn set_camera(&mut self, pose: CameraPose);
    /// Presents the frame.
    fn draw(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: Scene + ?Sized> Scene for &mut S {
    fn spawn(&mut self, name: &str) -> NodeId {
        (**self).spawn(name)
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) {
        (**self).set_transform(node, transform);
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        (**self).set_visible(node, visible);
    }

    fn set_camera(&mut self, pose: CameraPose) {
        (**self).set_camera(pose);
    }

    fn draw(&mut self) -> Result<()> {
        (**self).draw()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
}

/// In-memory scene graph. Keeps the latest state of every node so headless
/// runs and tests can inspect what a renderer would draw.
#[derive(Debug, Default)]
pub struct RenderGraph {
    nodes: Vec<SceneNode>,
    camera: CameraPose,
    frames_drawn: u64,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|node| node.name == name)
            .map(|index| NodeId(index as u32))
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn visible_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.visible).count()
    }

    pub fn camera(&self) -> CameraPose {
        self.camera
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        let node = self.nodes.get_mut(id.0 as usize);
        if node.is_none() {
            tracing::warn!(?id, "update for unknown scene node ignored");
        }
        node
    }
}

impl Scene for RenderGraph {
    fn spawn(&mut self, name: &str) -> NodeId {
        self.nodes.push(SceneNode {
            name: name.to_string(),
            transform: Transform::default(),
            visible: false,
        });
        NodeId((self.nodes.len() - 1) as u32)
    }

    fn set_transform(&mut self, node: NodeId, transform: Transform) {
        if let Some(node) = self.node_mut(node) {
            node.transform = transform;
        }
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(node) = self.node_mut(node) {
            node.visible = visible;
        }
    }

    fn set_camera(&mut self, pose: CameraPose) {
        self.camera = pose;
    }

    fn draw(&mut self) -> Result<()> {
        self.frames_drawn += 1;
        tracing::trace!(
            frame = self.frames_drawn,
            visible = self.visible_count(),
            "frame presented"
        );
        Ok(())
    }
}
