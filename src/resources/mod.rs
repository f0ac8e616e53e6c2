//! Loading of external assets.
//!
//! [`load_model_gltf`] fetches a glTF 2.0 file (`.gltf` with external or
//! embedded buffers, or binary `.glb`) through an [`AssetSource`], resolves its
//! buffers and base colour textures and turns the default scene into an
//! [`Entity`] subtree. Everything stays on the CPU; the renderer uploads the
//! subtree once it is attached to the scene graph.

use std::{collections::HashMap, sync::Arc};

use base64::Engine;
use futures::channel::mpsc;

use crate::data_structures::{
    model::{Color, Material, MeshData, ModelVertex, Primitive},
    scene_graph::{Entity, Renderable},
    transform::Transform,
};

pub mod texture;

/// Receives load progress as fractions in `[0, 1]`.
pub type ProgressSender = mpsc::UnboundedSender<f32>;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("asset not found: {0}")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[cfg(target_arch = "wasm32")]
    #[error("failed to fetch {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid glTF: {0}")]
    Parse(#[from] gltf::Error),
    #[error("failed to decode image {name}: {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("unsupported uri {0}")]
    UnsupportedUri(String),
    #[error("malformed data uri: {0}")]
    DataUri(#[from] base64::DecodeError),
    #[error("buffer {0} is missing or too short")]
    MissingBuffer(usize),
    #[error("{0} contains no scene")]
    EmptyScene(String),
}

/// Root of a parsed asset graph, ready to be attached to the scene.
#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub root: Entity,
}

/// Where asset paths are resolved: a directory natively, a path below the page origin on the web.
#[derive(Clone, Debug, PartialEq)]
pub struct AssetSource {
    root: String,
}

impl AssetSource {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    #[cfg(target_arch = "wasm32")]
    fn format_url(&self, file_name: &str) -> Result<reqwest::Url, LoadError> {
        let origin = web_sys::window()
            .and_then(|window| window.location().origin().ok())
            .ok_or_else(|| LoadError::UnsupportedUri(file_name.to_string()))?;
        let root = self.root.trim_matches('/');
        let base = if root.is_empty() {
            format!("{}/", origin)
        } else {
            format!("{}/{}/", origin, root)
        };
        reqwest::Url::parse(&base)
            .and_then(|base| base.join(file_name.trim_start_matches('/')))
            .map_err(|_| LoadError::UnsupportedUri(file_name.to_string()))
    }

    pub async fn load_binary(&self, file_name: &str) -> Result<Vec<u8>, LoadError> {
        #[cfg(target_arch = "wasm32")]
        let data = {
            let url = self.format_url(file_name)?;
            let http_err = |source| LoadError::Http {
                path: file_name.to_string(),
                source,
            };
            let response = reqwest::get(url).await.map_err(http_err)?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(LoadError::NotFound(file_name.to_string()));
            }
            response
                .error_for_status()
                .map_err(http_err)?
                .bytes()
                .await
                .map_err(http_err)?
                .to_vec()
        };
        #[cfg(not(target_arch = "wasm32"))]
        let data = {
            let path = std::path::Path::new(&self.root).join(file_name.trim_start_matches('/'));
            tokio::fs::read(&path).await.map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    LoadError::NotFound(path.display().to_string())
                } else {
                    LoadError::Io {
                        path: path.display().to_string(),
                        source,
                    }
                }
            })?
        };

        Ok(data)
    }
}

/// Resolves `uri` relative to the directory of `base`, decoding `%XX` escapes.
pub fn resolve_uri(base: &str, uri: &str) -> Result<String, LoadError> {
    if uri.starts_with("data:") || uri.contains("://") {
        return Err(LoadError::UnsupportedUri(uri.to_string()));
    }
    let decoded = urlencoding::decode(uri)
        .map_err(|_| LoadError::UnsupportedUri(uri.to_string()))?;
    Ok(match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], decoded),
        None => decoded.into_owned(),
    })
}

/// Splits a base64 `data:` uri into its media type and payload.
pub fn decode_data_uri(uri: &str) -> Result<(Option<&str>, Vec<u8>), LoadError> {
    let unsupported = || LoadError::UnsupportedUri(uri.to_string());
    let (header, payload) = uri
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(','))
        .ok_or_else(unsupported)?;
    let media_type = header.strip_suffix(";base64").ok_or_else(unsupported)?;
    let data = base64::engine::general_purpose::STANDARD.decode(payload)?;
    Ok(((!media_type.is_empty()).then_some(media_type), data))
}

/// Bytes behind a buffer or image uri: decoded in place or fetched next to `base`.
async fn load_uri(source: &AssetSource, base: &str, uri: &str) -> Result<Vec<u8>, LoadError> {
    if uri.starts_with("data:") {
        return decode_data_uri(uri).map(|(_, data)| data);
    }
    source.load_binary(&resolve_uri(base, uri)?).await
}

/// Counts finished steps and reports them as a fraction.
struct Progress {
    sender: Option<ProgressSender>,
    done: usize,
    total: usize,
}

impl Progress {
    fn new(sender: Option<ProgressSender>) -> Self {
        Self {
            sender,
            done: 0,
            total: 1,
        }
    }

    fn report(&self, fraction: f32) {
        if let Some(sender) = &self.sender {
            // a dropped receiver only means nobody is listening anymore
            let _ = sender.unbounded_send(fraction);
        }
    }

    fn set_total(&mut self, total: usize) {
        self.total = total.max(self.done + 1);
    }

    fn advance(&mut self) {
        self.done = (self.done + 1).min(self.total - 1);
        self.report(self.done as f32 / self.total as f32);
    }

    fn finish(&mut self) {
        self.done = self.total;
        self.report(1.0);
    }
}

/**
 * Loads a glTF model and converts its default scene into an entity subtree.
 *
 * The returned root is a `Group` named after the scene (or the file), holding the
 * top-level nodes with their local transforms. Only triangle primitives are kept.
 */
pub async fn load_model_gltf(
    source: &AssetSource,
    file_name: &str,
    progress: Option<ProgressSender>,
) -> Result<LoadedModel, LoadError> {
    let mut progress = Progress::new(progress);
    let gltf_bytes = source.load_binary(file_name).await?;
    let gltf = gltf::Gltf::from_slice(&gltf_bytes)?;

    let uri_buffers = gltf
        .buffers()
        .filter(|buffer| matches!(buffer.source(), gltf::buffer::Source::Uri(_)))
        .count();
    // file + buffers + images + building the node tree
    progress.set_total(1 + uri_buffers + gltf.images().count() + 1);
    progress.advance();

    // Load buffers
    let mut buffer_data: Vec<Vec<u8>> = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf
                    .blob
                    .as_deref()
                    .ok_or(LoadError::MissingBuffer(buffer.index()))?;
                buffer_data.push(blob.into());
            }
            gltf::buffer::Source::Uri(uri) => {
                buffer_data.push(load_uri(source, file_name, uri).await?);
                progress.advance();
            }
        }
        if buffer_data[buffer.index()].len() < buffer.length() {
            return Err(LoadError::MissingBuffer(buffer.index()));
        }
    }

    // Load images, each once even if several materials share it
    let mut images: HashMap<usize, Arc<image::RgbaImage>> = HashMap::new();
    for image in gltf.images() {
        let name = image.name().unwrap_or(file_name).to_string();
        let decoded = match image.source() {
            gltf::image::Source::View { view, mime_type } => {
                let data = &buffer_data[view.buffer().index()];
                let bytes = data
                    .get(view.offset()..view.offset() + view.length())
                    .ok_or(LoadError::MissingBuffer(view.buffer().index()))?;
                texture::decode_image(bytes, Some(mime_type), &name)?
            }
            gltf::image::Source::Uri { uri, mime_type } if uri.starts_with("data:") => {
                let (media_type, bytes) = decode_data_uri(uri)?;
                texture::decode_image(&bytes, mime_type.or(media_type), &name)?
            }
            gltf::image::Source::Uri { uri, mime_type } => {
                let path = resolve_uri(file_name, uri)?;
                let bytes = source.load_binary(&path).await?;
                texture::decode_image(&bytes, mime_type, &path)?
            }
        };
        images.insert(image.index(), decoded);
        progress.advance();
    }

    // Load materials
    let materials: Vec<Material> = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let base_color = pbr.base_color_texture();
            let texture = base_color
                .as_ref()
                .and_then(|info| images.get(&info.texture().source().index()))
                .cloned();
            Material {
                double_sided: material.double_sided(),
                uv_set: base_color.map_or(0, |info| info.tex_coord()),
                ..Material::standard(
                    material.name().unwrap_or("gltf material"),
                    Color(pbr.base_color_factor()),
                    texture,
                )
            }
        })
        .collect();

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| LoadError::EmptyScene(file_name.to_string()))?;
    let children = scene
        .nodes()
        .map(|node| to_entity(node, &buffer_data, &materials))
        .collect();
    let root = Entity::new(scene.name().unwrap_or(file_name), Renderable::Group)
        .with_children(children);
    progress.finish();

    log::info!(
        "loaded {} with {} entities",
        file_name,
        root.subtree_len()
    );
    Ok(LoadedModel { root })
}

fn to_entity(node: gltf::Node, buffers: &[Vec<u8>], materials: &[Material]) -> Entity {
    let name = node
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("node {}", node.index()));
    let renderable = match node.mesh() {
        Some(mesh) => Renderable::Mesh(to_mesh(&mesh, buffers, materials)),
        None => Renderable::Group,
    };
    let (translation, [x, y, z, w], scale) = node.transform().decomposed();
    let transform = Transform {
        position: translation.into(),
        rotation: cgmath::Quaternion::new(w, x, y, z),
        scale: scale.into(),
    };
    let children = node
        .children()
        .map(|child| to_entity(child, buffers, materials))
        .collect();
    Entity::new(&name, renderable)
        .with_transform(transform)
        .with_children(children)
}

fn to_mesh(mesh: &gltf::Mesh, buffers: &[Vec<u8>], materials: &[Material]) -> MeshData {
    let name = mesh.name().unwrap_or("unknown_mesh").to_string();
    let mut primitives = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!(
                "skipping primitive {} of mesh {}: mode {:?} is not supported",
                primitive.index(),
                name,
                primitive.mode()
            );
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));

        let mut vertices: Vec<ModelVertex> = match reader.read_positions() {
            Some(positions) => positions
                .map(|position| ModelVertex {
                    position,
                    ..Default::default()
                })
                .collect(),
            None => {
                log::warn!("skipping primitive {} of mesh {} without positions", primitive.index(), name);
                continue;
            }
        };
        let has_normals = match reader.read_normals() {
            Some(normals) => {
                vertices
                    .iter_mut()
                    .zip(normals)
                    .for_each(|(vertex, normal)| vertex.normal = normal);
                true
            }
            None => false,
        };
        let material = primitive
            .material()
            .index()
            .and_then(|idx| materials.get(idx))
            .cloned()
            .unwrap_or_default();
        if let Some(tex_coords) = reader
            .read_tex_coords(material.uv_set)
            .map(|v| v.into_f32())
        {
            vertices
                .iter_mut()
                .zip(tex_coords)
                .for_each(|(vertex, tex_coords)| vertex.tex_coords = tex_coords);
        }
        let indices = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };

        let mut primitive = Primitive {
            vertices,
            indices,
            material,
        };
        if !has_normals {
            primitive.compute_normals();
        }
        primitives.push(primitive);
    }
    MeshData { name, primitives }
}
