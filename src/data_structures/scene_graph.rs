//! Scene graph and hierarchical scene organization.
//!
//! The [`SceneGraph`] is an append-only, insertion-ordered list of root
//! [`Entity`]s. Roots may own children (loaded models keep the node hierarchy
//! of their asset). There is no removal path: the number of roots only grows
//! for the lifetime of a session, and the renderer relies on that to mirror the
//! graph on the GPU by index.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    data_structures::{
        model::{Color, LineData, MeshData},
        transform::{self, Transform},
    },
    resources::{LoadError, LoadedModel},
    text::TextLabel,
};

/// Index of a root entity in insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityId(usize);

impl EntityId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Parameters of a light shining from the entity position towards the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
}

impl DirectionalLight {
    pub fn new(hex: u32, intensity: f32) -> Self {
        Self {
            color: Color::from_hex(hex),
            intensity,
        }
    }
}

/// What an entity draws (or, for lights, how it affects drawing).
#[derive(Clone, Debug)]
pub enum Renderable {
    Mesh(MeshData),
    Line(LineData),
    Light(DirectionalLight),
    Text(TextLabel),
    /// Pure transform node, only its children draw.
    Group,
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub name: String,
    pub transform: Transform,
    pub visible: bool,
    pub renderable: Renderable,
    pub children: Vec<Entity>,
}

impl Entity {
    /// A visible entity with identity transform and no children.
    pub fn new(name: &str, renderable: Renderable) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            visible: true,
            renderable,
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_children(mut self, children: Vec<Entity>) -> Self {
        self.children = children;
        self
    }

    /// Number of entities in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Entity::subtree_len).sum::<usize>()
    }

    /// Depth-first walk handing out the composed world matrix of every visible node.
    /// Invisible nodes hide their whole subtree.
    pub fn walk_visible<'a>(
        &'a self,
        parent: &Matrix4<f32>,
        f: &mut dyn FnMut(&'a Entity, Matrix4<f32>),
    ) {
        if !self.visible {
            return;
        }
        let world = parent * self.transform.to_matrix();
        f(self, world);
        for child in &self.children {
            child.walk_visible(&world, f);
        }
    }
}

/// Where a freshly loaded model is put in the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub position: cgmath::Vector3<f32>,
    /// Rotation about the Y axis.
    pub rotation_y: cgmath::Rad<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Placement {
    pub fn to_transform(&self) -> Transform {
        let mut transform = Transform {
            position: self.position,
            scale: self.scale,
            ..Default::default()
        };
        transform.rotate_y(self.rotation_y);
        transform
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation_y: cgmath::Rad(0.0),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Result of handing a settled load to the scene.
#[derive(Debug)]
pub enum LoadOutcome {
    Attached(EntityId),
    Failed(LoadError),
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    entities: Vec<Entity>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a root entity and returns its id.
    pub fn add(&mut self, entity: Entity) -> EntityId {
        log::debug!("adding entity {:?} at index {}", entity.name, self.entities.len());
        self.entities.push(entity);
        EntityId(self.entities.len() - 1)
    }

    /// Number of root entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of entities including all descendants.
    pub fn total_len(&self) -> usize {
        self.entities.iter().map(Entity::subtree_len).sum()
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .position(|entity| entity.name == name)
            .map(EntityId)
    }

    /// Sets the visibility flag; returns whether it changed. Unknown ids are ignored.
    pub fn set_visible(&mut self, id: EntityId, visible: bool) -> bool {
        match self.entities.get_mut(id.0) {
            Some(entity) if entity.visible != visible => {
                entity.visible = visible;
                true
            }
            Some(_) => false,
            None => {
                log::warn!("tried to change visibility of unknown entity {}", id.0);
                false
            }
        }
    }

    /// Attaches a loaded model as a new visible root placed at `placement`.
    pub fn attach_model(&mut self, model: LoadedModel, placement: &Placement) -> EntityId {
        let mut root = model.root;
        root.transform = placement.to_transform();
        root.visible = true;
        self.add(root)
    }

    /**
     * Completion handler for the single asset load.
     *
     * Success attaches the model; failure writes exactly one error line and
     * leaves the scene untouched. No retry.
     */
    pub fn attach_loaded(
        &mut self,
        result: Result<LoadedModel, LoadError>,
        placement: &Placement,
    ) -> LoadOutcome {
        match result {
            Ok(model) => {
                let name = model.root.name.clone();
                let id = self.attach_model(model, placement);
                log::info!("model {:?} attached as entity {}", name, id.0);
                LoadOutcome::Attached(id)
            }
            Err(e) => {
                log::error!("{}", e);
                LoadOutcome::Failed(e)
            }
        }
    }

    /// The first visible light together with its world position.
    pub fn light(&self) -> Option<(DirectionalLight, cgmath::Vector3<f32>)> {
        let mut found = None;
        for entity in &self.entities {
            entity.walk_visible(&Matrix4::identity(), &mut |node, world| {
                if found.is_some() {
                    return;
                }
                if let Renderable::Light(light) = &node.renderable {
                    found = Some((*light, transform::world_position(&world)));
                }
            });
            if found.is_some() {
                break;
            }
        }
        found
    }
}
