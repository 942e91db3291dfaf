//! End-to-end frames through the headless device

use std::rc::Rc;

use slotmap::Key;

use super::device::{BufferBits, GraphicsDevice, TextureDesc, TextureFormat, UniformValue};
use super::frame_pipeline::{FramePipeline, DEFAULT_ORDER};
use super::headless::HeadlessDevice;
use super::material::{Material, UnlitMaterial};
use super::mesh::Mesh;
use super::passes::graph::PassKind;
use super::passes::{forward_pass, pre_pass, ssao_pass, velocity_buffer, PipelineError};
use super::postprocessing::Profile;
use super::viewport::Viewport;
use crate::core::config::RenderConfig;
use crate::ecs::components::{CameraComponent, MeshRendererComponent, TransformComponent};
use crate::ecs::{Entity, World};
use crate::foundation::math::Vec3;

fn config() -> RenderConfig {
    RenderConfig {
        width: 160,
        height: 90,
        bloom_mip_depth: 4,
        ..RenderConfig::default()
    }
}

struct Scene {
    device: HeadlessDevice,
    pipeline: FramePipeline,
    world: World,
}

impl Scene {
    fn new(config: &RenderConfig) -> Self {
        let mut device = HeadlessDevice::new();
        let mut pipeline = FramePipeline::new(config).unwrap();
        pipeline.create(&mut device);

        let mut world = World::new();
        let camera = world.create_entity();
        world.add_component(camera, TransformComponent::from_position(Vec3::new(0.0, 0.0, 6.0)));
        world.add_component(camera, CameraComponent::default());

        Self {
            device,
            pipeline,
            world,
        }
    }

    fn material(&mut self, shader: &str) -> Rc<dyn Material> {
        let shader = self.pipeline.shaders().get(&mut self.device, shader);
        Rc::new(UnlitMaterial::new(shader))
    }

    fn spawn(&mut self, material: Option<Rc<dyn Material>>, x: f32) -> Entity {
        let entity = self.world.create_entity();
        self.world
            .add_component(entity, TransformComponent::from_position(Vec3::new(x, 0.0, 0.0)));
        self.world.add_component(
            entity,
            MeshRendererComponent {
                mesh: Some(Rc::new(Mesh::cube())),
                material,
            },
        );
        entity
    }

    fn frame(&mut self, selected: Option<Entity>) -> super::FrameOutputs {
        self.device.clear_log();
        self.pipeline.render(&mut self.device, &mut self.world, selected)
    }

    fn count(&self, program: &str) -> usize {
        self.device
            .draws()
            .iter()
            .filter(|d| d.program.as_deref() == Some(program))
            .count()
    }
}

#[test]
fn test_frame_produces_every_attachment() {
    let mut scene = Scene::new(&config());
    let material = scene.material("lit");
    scene.spawn(Some(material), 0.0);
    scene.pipeline.use_profile_effects(true);

    let out = scene.frame(None);
    assert!(!out.depth.is_null());
    assert!(!out.normal.is_null());
    assert!(!out.velocity.is_null());
    assert!(!out.hdr.is_null());
    assert!(!out.bloom.is_null());
    assert!(!out.output.is_null());
    assert_ne!(out.output, out.hdr);
    assert_eq!(out.stats.draws, 1);

    assert_eq!(scene.device.draws_into(pre_pass::LABEL).count(), 1);
    assert_eq!(scene.device.draws_into(velocity_buffer::LABEL).count(), 1);
    assert_eq!(scene.device.draws_into(forward_pass::MSAA_LABEL).count(), 1);
    assert_eq!(scene.pipeline.last_outputs(), out);
}

#[test]
fn test_passes_run_in_graph_order() {
    let mut scene = Scene::new(&config());
    let material = scene.material("lit");
    scene.spawn(Some(material), 0.0);
    let mut profile = Profile::default();
    profile.ambient_occlusion.enabled = true;
    scene.pipeline.set_profile(profile);
    scene.pipeline.use_profile_effects(true);
    scene.frame(None);

    let mut labels: Vec<&str> = Vec::new();
    for draw in scene.device.draws() {
        if labels.last() != Some(&draw.framebuffer_label.as_str()) {
            labels.push(draw.framebuffer_label.as_str());
        }
    }
    assert_eq!(
        &labels[..4],
        &[
            pre_pass::LABEL,
            ssao_pass::LABEL,
            velocity_buffer::LABEL,
            forward_pass::MSAA_LABEL
        ]
    );
    let order: Vec<PassKind> = scene.pipeline.graph().order().collect();
    assert_eq!(order, DEFAULT_ORDER.to_vec());
}

#[test]
fn test_bloom_draw_counts() {
    let mut scene = Scene::new(&config());
    scene.pipeline.use_profile_effects(true);
    let out = scene.frame(None);

    assert_eq!(scene.count("bloom_prefilter"), 1);
    assert_eq!(scene.count("bloom_downsampling"), 4);
    assert_eq!(scene.count("bloom_upsampling"), 3);
    assert_eq!(out.bloom, scene.pipeline.post().bloom().mip_texture(0));
}

#[test]
fn test_ssao_gated_by_profile() {
    let mut scene = Scene::new(&config());
    let material = scene.material("lit");
    scene.spawn(Some(material), 0.0);

    let out = scene.frame(None);
    assert!(out.ssao.is_null());
    assert_eq!(scene.count("ssao"), 0);

    let mut profile = Profile::default();
    profile.ambient_occlusion.enabled = true;
    scene.pipeline.set_profile(profile);
    scene.pipeline.use_profile_effects(true);
    let out = scene.frame(None);
    assert!(!out.ssao.is_null());
    assert_eq!(scene.count("ssao"), 1);
    assert_eq!(scene.device.draws_into(ssao_pass::BLUR_H_LABEL).count(), 0);
}

#[test]
fn test_neutral_profile_by_default_and_in_wireframe() {
    let mut scene = Scene::new(&config());
    let mut profile = Profile::default();
    profile.vignette.enabled = true;
    scene.pipeline.set_profile(profile);

    assert_eq!(*scene.pipeline.active_profile(), Profile::neutral());
    let out = scene.frame(None);
    assert!(out.bloom.is_null());
    assert_eq!(scene.count("vignette"), 0);
    assert_eq!(scene.count("color_grading"), 1);

    scene.pipeline.use_profile_effects(true);
    assert_eq!(*scene.pipeline.active_profile(), profile);
    scene.pipeline.set_wireframe(true);
    assert_eq!(*scene.pipeline.active_profile(), Profile::neutral());
    scene.frame(None);
    assert_eq!(scene.count("vignette"), 0);
}

#[test]
fn test_selection_outline_and_stale_selection() {
    let mut scene = Scene::new(&config());
    let material = scene.material("lit");
    scene.spawn(Some(Rc::clone(&material)), -2.0);
    let selected = scene.spawn(Some(material), 2.0);

    let out = scene.frame(Some(selected));
    assert!(out.stats.outline_drawn);
    assert_eq!(scene.device.draws_into(forward_pass::MSAA_LABEL).count(), 3);

    scene.world.destroy_entity(selected);
    let out = scene.frame(Some(selected));
    assert!(!out.stats.outline_drawn);
    assert_eq!(scene.device.draws_into(forward_pass::MSAA_LABEL).count(), 1);
}

#[test]
fn test_bind_deduplication_across_frame() {
    let mut scene = Scene::new(&config());
    let a = scene.material("lit");
    let b = scene.material("unlit");
    for (i, m) in [&a, &b, &a, &b].into_iter().enumerate() {
        scene.spawn(Some(Rc::clone(m)), i as f32);
    }
    scene.spawn(None, 9.0);

    let out = scene.frame(None);
    assert_eq!(out.stats.draws, 4);
    assert_eq!(out.stats.shader_binds, 2);
    assert_eq!(out.stats.material_binds, 2);
    assert_eq!(out.stats.skipped_unbound, 1);
    assert_eq!(scene.pipeline.queue().entries().len(), 5);
}

#[test]
fn test_incomplete_targets_degrade_to_null() {
    let mut device = HeadlessDevice::new();
    device.fail_framebuffer(pre_pass::LABEL);
    device.fail_framebuffer(forward_pass::MSAA_LABEL);
    let mut pipeline = FramePipeline::new(&config()).unwrap();
    pipeline.create(&mut device);
    let mut world = World::new();

    let out = pipeline.render(&mut device, &mut world, None);
    assert!(out.depth.is_null());
    assert!(out.hdr.is_null());
    assert!(!out.velocity.is_null());
    assert!(!out.output.is_null());
}

#[test]
fn test_render_without_camera_uses_default() {
    let mut device = HeadlessDevice::new();
    let mut pipeline = FramePipeline::new(&config()).unwrap();
    pipeline.create(&mut device);
    let mut world = World::new();
    let out = pipeline.render(&mut device, &mut world, None);
    assert!(!out.output.is_null());
}

#[test]
fn test_render_before_create_is_empty() {
    let mut device = HeadlessDevice::new();
    let mut pipeline = FramePipeline::new(&config()).unwrap();
    let mut world = World::new();
    let out = pipeline.render(&mut device, &mut world, None);
    assert_eq!(out, super::FrameOutputs::default());
    assert!(device.draws().is_empty());
}

#[test]
fn test_resize_does_not_leak() {
    let mut scene = Scene::new(&config());
    scene.frame(None);
    let textures = scene.device.texture_count();
    let framebuffers = scene.device.framebuffer_count();
    let renderbuffers = scene.device.renderbuffer_count();

    for size in [(320, 200), (64, 64), (160, 90)] {
        scene
            .pipeline
            .resize(&mut scene.device, Viewport::new(size.0, size.1));
        scene.frame(None);
    }
    assert_eq!(scene.pipeline.viewport(), Viewport::new(160, 90));
    assert_eq!(scene.device.texture_count(), textures);
    assert_eq!(scene.device.framebuffer_count(), framebuffers);
    assert_eq!(scene.device.renderbuffer_count(), renderbuffers);
}

#[test]
fn test_resize_to_new_size_reallocates() {
    let mut scene = Scene::new(&config());
    scene.pipeline.resize(&mut scene.device, Viewport::new(320, 180));
    let out = scene.frame(None);
    let desc = scene.device.texture_desc(out.hdr).unwrap();
    assert_eq!((desc.width, desc.height), (320, 180));

    scene.pipeline.resize(&mut scene.device, Viewport::new(0, 10));
    assert_eq!(scene.pipeline.viewport(), Viewport::new(320, 180));
}

#[test]
fn test_msaa_change_rebuilds_forward_only() {
    let mut scene = Scene::new(&config());
    scene.frame(None);
    let before = scene.pipeline.last_outputs();
    let textures = scene.device.texture_count();

    scene.pipeline.update_msaa(&mut scene.device, 8);
    assert_eq!(scene.pipeline.msaa_samples(), 8);
    let after = scene.frame(None);
    assert_eq!(after.depth, before.depth);
    assert_eq!(after.velocity, before.velocity);
    assert_eq!(scene.device.texture_count(), textures);
    assert!(!after.hdr.is_null());
}

#[test]
fn test_invalid_pass_order_rejected() {
    let err = FramePipeline::with_order(
        &config(),
        &[PassKind::Ssao, PassKind::PrePass, PassKind::Forward],
    )
    .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InputProducedLater {
            pass: PassKind::Ssao,
            ..
        }
    ));

    let err = FramePipeline::with_order(&config(), &[PassKind::Forward]).unwrap_err();
    assert!(matches!(err, PipelineError::UnsatisfiedInput { .. }));
}

#[test]
fn test_pipeline_without_ssao_pass() {
    let mut device = HeadlessDevice::new();
    let mut pipeline = FramePipeline::with_order(
        &config(),
        &[
            PassKind::PrePass,
            PassKind::Velocity,
            PassKind::Forward,
            PassKind::PostProcessing,
        ],
    )
    .unwrap();
    pipeline.create(&mut device);
    let mut profile = Profile::default();
    profile.ambient_occlusion.enabled = true;
    pipeline.set_profile(profile);
    pipeline.use_profile_effects(true);

    let mut world = World::new();
    let out = pipeline.render(&mut device, &mut world, None);
    assert!(out.ssao.is_null());
    assert!(!out.output.is_null());
}

#[test]
fn test_present_blits_final_image() {
    let mut scene = Scene::new(&config());
    scene.frame(None);
    let blit = scene.device.blits().last().unwrap();
    assert_eq!(blit.destination, None);
    assert_eq!(blit.buffers, BufferBits::COLOR);
}

#[test]
fn test_lens_dirt_survives_recreate() {
    let mut scene = Scene::new(&config());
    let dirt = scene
        .device
        .create_texture(&TextureDesc::new(16, 16, TextureFormat::Rgba8), None)
        .unwrap();
    scene.pipeline.set_lens_dirt(dirt);
    scene.pipeline.resize(&mut scene.device, Viewport::new(200, 100));

    let mut profile = Profile::default();
    profile.bloom.lens_dirt_enabled = true;
    profile.motion_blur.enabled = false;
    scene.pipeline.set_profile(profile);
    scene.pipeline.use_profile_effects(true);
    scene.frame(None);
    assert_eq!(scene.device.bound_texture(2), Some(dirt));
    assert_eq!(
        scene.device.uniform("bloom_composite", "lensDirtEnabled"),
        Some(UniformValue::Bool(true))
    );
}

#[test]
fn test_destroy_releases_all_targets() {
    let mut scene = Scene::new(&config());
    scene.frame(None);
    scene.pipeline.destroy(&mut scene.device);
    scene.pipeline.destroy(&mut scene.device);
    assert_eq!(scene.device.texture_count(), 0);
    assert_eq!(scene.device.framebuffer_count(), 0);
    assert_eq!(scene.device.renderbuffer_count(), 0);
    assert!(!scene.pipeline.is_created());
}
