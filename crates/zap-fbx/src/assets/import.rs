//! FBX bytes to engine-ready meshes, skeleton and clip.

use std::sync::Arc;

use super::clip::{build_animation_clips, AnimationClip};
use super::fbx::{extract_scene, parse_fbx_binary_with, ConnectionGraph, FbxScene, Geometry, ReaderOptions};
use super::options::ImportOptions;
use super::skeleton::{build_joints, Skeleton};
use super::skinning::{build_skinning_data, SkinningData};
use crate::api::types::ObjectId;
use crate::core::error::FbxError;

/// One geometry ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub geometry_id: ObjectId,
    /// Model the geometry is attached to, if any.
    pub model_id: Option<ObjectId>,
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    /// `None` for rigid meshes.
    pub skin: Option<SkinningData>,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

/// Everything imported from one file.
#[derive(Debug, Clone)]
pub struct ImportedModel {
    pub meshes: Vec<MeshData>,
    pub skeleton: Arc<Skeleton>,
    /// One clip per take, in file order. Shared by every spawned instance.
    pub clips: Vec<Arc<AnimationClip>>,
}

impl ImportedModel {
    pub fn is_skinned(&self) -> bool {
        self.meshes.iter().any(|m| m.skin.is_some())
    }

    /// The first take, played by default.
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clips.first()
    }

    pub fn clip_named(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.clips.iter().find(|c| c.name == name)
    }
}

/// Decode a binary FBX file and build its meshes, skeleton and clip.
pub fn import_fbx(bytes: &[u8], options: &ImportOptions) -> Result<ImportedModel, FbxError> {
    let reader = ReaderOptions {
        compression: options.compression,
    };
    let nodes = parse_fbx_binary_with(bytes, &reader)?;
    let scene = extract_scene(&nodes)?;
    let graph = ConnectionGraph::new(&scene.connections);
    let skeleton = build_joints(&scene, &graph)?;

    let meshes = scene
        .geometries
        .iter()
        .map(|geometry| build_mesh(&scene, &graph, &skeleton, geometry))
        .collect::<Result<Vec<_>, _>>()?;

    let clips: Vec<Arc<AnimationClip>> = if options.import_animation {
        build_animation_clips(&scene, &graph, &skeleton, &options.default_clip_name)
            .into_iter()
            .map(Arc::new)
            .collect()
    } else {
        Vec::new()
    };

    log::info!(
        "fbx: imported {} meshes, {} joints, {} clips",
        meshes.len(),
        skeleton.len(),
        clips.len()
    );

    Ok(ImportedModel {
        meshes,
        skeleton: Arc::new(skeleton),
        clips,
    })
}

fn build_mesh(
    scene: &FbxScene,
    graph: &ConnectionGraph,
    skeleton: &Skeleton,
    geometry: &Geometry,
) -> Result<MeshData, FbxError> {
    let skin = match graph
        .skin_of_geometry(scene, geometry.id)
        .and_then(|id| scene.skins.get(id))
    {
        Some(skin) if !skeleton.is_empty() => Some(build_skinning_data(
            scene,
            geometry,
            skin,
            skeleton.cluster_to_joint(),
            skeleton.len(),
        )?),
        Some(skin) => {
            log::warn!(
                "fbx: skin {} on geometry `{}` has no usable joints; mesh imported rigid",
                skin.id,
                geometry.name
            );
            None
        }
        None => None,
    };

    Ok(MeshData {
        name: geometry.name.clone(),
        geometry_id: geometry.id,
        model_id: graph.model_of_geometry(scene, geometry.id),
        positions: geometry
            .vertices
            .chunks_exact(3)
            .map(|p| [p[0], p[1], p[2]])
            .collect(),
        indices: geometry.indices.clone(),
        skin,
    })
}

#[cfg(test)]
mod tests {
    use glam::{Quat, Vec3};

    use super::*;
    use crate::assets::clip::compose_rotation;
    use crate::assets::fbx::test_support::{FbxWriter, ModelDesc, SceneBuilder, WriteArray};
    use crate::assets::fbx::{ArrayKind, Property};
    use crate::components::skeleton::BoneTransform;

    const BONE: i64 = 10;
    const CLUSTER: i64 = 20;
    const SKIN: i64 = 30;
    const GEOMETRY: i64 = 40;
    const MESH: i64 = 50;
    const STACK: i64 = 60;

    fn bone_desc() -> ModelDesc {
        ModelDesc {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(10.0, 20.0, 30.0),
            scale: None,
            pre_rotation: Some(Vec3::new(-90.0, 0.0, 0.0)),
        }
    }

    /// One bone skinning a triangle, with a rotation curve whose first key
    /// equals the bone's static rotation.
    fn single_bone_scene() -> SceneBuilder {
        let mut b = SceneBuilder::new();
        b.model(BONE, "Hips", "LimbNode", bone_desc())
            .model(MESH, "Body", "Mesh", ModelDesc::default())
            .geometry(GEOMETRY, "Body", &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], &[0, 1, -3])
            .skin(SKIN)
            .cluster(CLUSTER, "Hips", &[0, 1, 2], &[1.0, 1.0, 0.0005], None)
            .stack(STACK, "Walk")
            .oo(BONE, 0)
            .oo(MESH, 0)
            .oo(GEOMETRY, MESH)
            .oo(SKIN, GEOMETRY)
            .oo(CLUSTER, SKIN)
            .oo(BONE, CLUSTER)
            .animate(
                BONE,
                "Lcl Rotation",
                70,
                &[0.0, 1.0],
                [&[10.0, 40.0], &[20.0, 20.0], &[30.0, -30.0]],
            );
        b
    }

    fn same_rotation(a: Quat, b: Quat) -> bool {
        a.dot(b).abs() > 1.0 - 1e-5
    }

    #[test]
    fn bind_pose_sample_matches_static_transform() {
        let bytes = single_bone_scene().to_bytes(7400, WriteArray::Zlib);
        let model = import_fbx(&bytes, &ImportOptions::default()).unwrap();

        let clip = model.clip().expect("rotation curves make a clip");
        assert_eq!(clip.name, "Walk");
        assert!((clip.duration - 1.0).abs() < 1e-6);

        let mut pose = vec![BoneTransform::default(); model.skeleton.len()];
        clip.sample_into(&model.skeleton, 0.0, &mut pose);

        let desc = bone_desc();
        let expected = compose_rotation(desc.rotation, desc.pre_rotation);
        assert!(same_rotation(pose[0].rotation, expected));
        assert_eq!(pose[0].position, desc.translation);
        assert_eq!(pose[0].scale, Vec3::ONE);

        let rest = BoneTransform::from_pose(&model.skeleton.joints()[0].rest);
        assert!(same_rotation(pose[0].rotation, rest.rotation));
    }

    #[test]
    fn skinned_triangle_is_bound_to_its_bone() {
        let bytes = single_bone_scene().to_bytes(7500, WriteArray::Raw);
        let model = import_fbx(&bytes, &ImportOptions::default()).unwrap();

        assert_eq!(model.skeleton.len(), 1);
        assert_eq!(model.meshes.len(), 1);
        let mesh = &model.meshes[0];
        assert_eq!(mesh.model_id, Some(ObjectId(MESH)));
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.positions[1], [1.0, 0.0, 0.0]);

        let skin = mesh.skin.as_ref().unwrap();
        assert_eq!(skin.vertex_weights(0), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(skin.vertex_weights(1), &[1.0, 0.0, 0.0, 0.0]);
        // Below the noise threshold.
        assert_eq!(skin.vertex_weights(2), &[0.0; 4]);
        assert!(model.is_skinned());
    }

    #[test]
    fn layout_and_compression_do_not_change_the_result() {
        let scene = single_bone_scene();
        let a = import_fbx(&scene.to_bytes(7400, WriteArray::Raw), &ImportOptions::default()).unwrap();
        let b = import_fbx(&scene.to_bytes(7500, WriteArray::Zlib), &ImportOptions::default()).unwrap();
        assert_eq!(a.meshes, b.meshes);
        assert_eq!(a.skeleton, b.skeleton);
        assert_eq!(a.clips, b.clips);
    }

    #[test]
    fn animation_can_be_skipped_and_renamed() {
        let mut scene = single_bone_scene();
        let options = ImportOptions {
            import_animation: false,
            ..ImportOptions::default()
        };
        let bytes = scene.to_bytes(7400, WriteArray::Raw);
        assert!(import_fbx(&bytes, &options).unwrap().clips.is_empty());

        // Without a stack the configured name is used.
        scene = SceneBuilder::new();
        scene
            .model(BONE, "Hips", "LimbNode", bone_desc())
            .cluster(CLUSTER, "Hips", &[], &[], None)
            .oo(BONE, CLUSTER)
            .animate(BONE, "Lcl Translation", 70, &[0.0, 2.0], [&[0.0, 1.0], &[0.0, 0.0], &[0.0, 0.0]]);
        let options = ImportOptions::from_json(r#"{"default_clip_name":"Idle"}"#).unwrap();
        let model = import_fbx(&scene.to_bytes(7400, WriteArray::Raw), &options).unwrap();
        assert_eq!(model.clips.len(), 1);
        let clip = model.clip().unwrap();
        assert_eq!(clip.name, "Idle");
        assert!((clip.duration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn each_take_becomes_its_own_clip() {
        let mut b = SceneBuilder::new();
        b.model(BONE, "Hips", "LimbNode", ModelDesc::default())
            .cluster(CLUSTER, "Hips", &[], &[], None)
            .oo(BONE, CLUSTER)
            .stack(STACK, "Walk")
            .layer(61, "BaseLayer")
            .oo(61, STACK)
            .animate(BONE, "Lcl Translation", 70, &[0.0, 1.0], [&[1.0, 1.0], &[0.0, 0.0], &[0.0, 0.0]])
            .oo(70, 61)
            .stack(80, "Run")
            .layer(81, "BaseLayer")
            .oo(81, 80)
            .animate(BONE, "Lcl Translation", 90, &[0.0, 5.0], [&[99.0, 99.0], &[0.0, 0.0], &[0.0, 0.0]])
            .oo(90, 81);
        let model = import_fbx(&b.to_bytes(7500, WriteArray::Zlib), &ImportOptions::default()).unwrap();

        assert_eq!(model.clips.len(), 2);
        assert_eq!(model.clip().unwrap().name, "Walk");
        let mut pose = vec![BoneTransform::default(); model.skeleton.len()];

        let walk = model.clip_named("Walk").unwrap();
        assert!((walk.duration - 1.0).abs() < 1e-5);
        walk.sample_into(&model.skeleton, 0.0, &mut pose);
        assert_eq!(pose[0].position, Vec3::new(1.0, 0.0, 0.0));

        let run = model.clip_named("Run").unwrap();
        assert!((run.duration - 5.0).abs() < 1e-5);
        run.sample_into(&model.skeleton, 0.0, &mut pose);
        assert_eq!(pose[0].position, Vec3::new(99.0, 0.0, 0.0));
    }

    #[test]
    fn corrupt_vertices_follow_the_compression_policy() {
        let mut nodes = single_bone_scene().nodes();
        let objects = nodes.iter_mut().find(|n| n.name == "Objects").unwrap();
        let geometry = objects.children.iter_mut().find(|n| n.name == "Geometry").unwrap();
        let vertices = geometry.children.iter_mut().find(|n| n.name == "Vertices").unwrap();
        vertices.properties = vec![Property::UndecodedArray {
            kind: ArrayKind::F64,
            len: 9,
        }];
        let bytes = FbxWriter::new(7400).write(&nodes, WriteArray::Raw);

        let model = import_fbx(&bytes, &ImportOptions::default()).unwrap();
        assert_eq!(model.meshes[0].vertex_count(), 0);
        assert!(model.meshes[0].indices.is_empty());

        let err = import_fbx(&bytes, &ImportOptions::strict()).unwrap_err();
        assert!(matches!(err, FbxError::CorruptArray { .. }));
    }
}
