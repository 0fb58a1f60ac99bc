//! Particle field behavior seen through the recording context.

use std::time::Duration;

use shimmer::headless::Command;
use shimmer::particles::{Particle, MAX_SPIN};
use shimmer::prelude::*;

fn instanced(count: usize, seed: u64) -> (RecordingContext, ProgramCache, InstancedField) {
    let mut gfx = RecordingContext::new();
    let mut programs = ProgramCache::new(ShaderLibrary::builtin());
    let config = FieldConfig {
        count,
        ..FieldConfig::default()
    };
    let field = InstancedField::new(&mut gfx, &mut programs, &config, seed, None).unwrap();
    (gfx, programs, field)
}

#[test]
fn test_upload_size_for_ten_thousand() {
    let (mut gfx, _programs, mut field) = instanced(10_000, 1);
    assert_eq!(field.upload_size(), 640_000);

    gfx.clear_commands();
    field.animate(&mut gfx, &Camera::new(), 0.016).unwrap();

    let writes: Vec<_> = gfx
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::WriteBuffer { offset, len, .. } => Some((*offset, *len)),
            _ => None,
        })
        .collect();
    assert_eq!(writes, vec![(0, 640_000)]);
    assert_eq!(gfx.draw_count(), 1);
}

#[test]
fn test_upload_size_scales_with_count() {
    for count in [1, 7, 1000] {
        let (_gfx, _programs, field) = instanced(count, 2);
        assert_eq!(field.upload_size(), count * 16 * 4);
    }
}

#[test]
fn test_program_compiled_once_per_type() {
    let mut gfx = RecordingContext::new();
    let mut programs = ProgramCache::new(ShaderLibrary::builtin());
    let config = FieldConfig {
        count: 10,
        ..FieldConfig::default()
    };

    let mut fields: Vec<InstancedField> = (0..3)
        .map(|seed| InstancedField::new(&mut gfx, &mut programs, &config, seed, None).unwrap())
        .collect();
    let compiles = gfx
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::CreateProgram { .. }))
        .count();
    assert_eq!(compiles, 1);
    assert_eq!(programs.ref_count(ProgramKind::InstancedCube), 3);

    for field in &mut fields {
        field.release(&mut gfx, &mut programs);
    }
    assert_eq!(gfx.live_programs(), 0);
    assert_eq!(gfx.live_buffers(), 0);
}

#[test]
fn test_targets_cycle_through_short_cloud() {
    let mut gfx = RecordingContext::new();
    let mut programs = ProgramCache::new(ShaderLibrary::builtin());
    let cloud = PointCloud::from_flat(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();
    let config = FieldConfig {
        count: 5,
        ..FieldConfig::default()
    };
    let field = InstancedField::new(&mut gfx, &mut programs, &config, 1, Some(&cloud)).unwrap();

    let targets = field.targets().unwrap();
    assert_eq!(targets.len(), 5);
    assert_eq!(targets[4], Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn test_particles_converge_on_shape() {
    let mut gfx = RecordingContext::new();
    let mut programs = ProgramCache::new(ShaderLibrary::builtin());
    let cloud = PointCloud::builtin().unwrap();
    let config = FieldConfig {
        count: 200,
        ..FieldConfig::default()
    };
    let mut field = InstancedField::new(&mut gfx, &mut programs, &config, 11, Some(&cloud)).unwrap();

    for _ in 0..600 {
        field.update(1.0 / 60.0);
    }
    for (m, target) in field.transforms().iter().zip(field.targets().unwrap()) {
        assert!(m.w_axis.truncate().distance(*target) < 1e-3);
    }
}

/// 800×600 surface, 1000 pooled particles, fixed seed, one frame of 16 ms.
#[test]
fn test_pooled_frame_is_deterministic() {
    const SEED: u64 = 0x5eed;
    let config = SceneConfig::sparkle()
        .with_mode(FieldMode::Pooled)
        .with_particle_count(1000)
        .with_seed(SEED);

    let build = |config: &SceneConfig| {
        let config = config.clone();
        RenderLoop::new(
            HeadlessSurface::new(800, 600),
            ManualScheduler::new(),
            ShaderLibrary::builtin(),
            move |gfx, programs, size| AnyScene::build(gfx, programs, &config, SEED, None, size),
        )
        .unwrap()
    };

    let mut render_loop = build(&config);
    let initial: Vec<Particle> = match render_loop.scene() {
        AnyScene::Sparkle(scene) => match scene.field() {
            AnyField::Pooled(field) => field.particles().to_vec(),
            other => panic!("expected a pooled field, got {:?}", other.mode()),
        },
        _ => panic!("expected the sparkle scene"),
    };
    assert_eq!(initial.len(), 1000);

    render_loop.scheduler_mut().advance(Duration::from_millis(16));
    let now = render_loop.scheduler().now();
    assert_eq!(render_loop.on_frame(now), FrameOutcome::Rendered);
    assert_eq!(render_loop.context().unwrap().draw_count(), 1000);

    let AnyScene::Sparkle(scene) = render_loop.scene() else {
        panic!("expected the sparkle scene");
    };
    let dt = 0.016;
    for (i, before) in initial.iter().enumerate() {
        let after = scene.field().transform(i).unwrap();
        let expected = Mat4::from_translation(before.drift * dt)
            * before.transform
            * Mat4::from_rotation_x(before.spin * dt);
        assert!(after.abs_diff_eq(expected, 1e-5), "particle {i} diverged");
        assert!(before.spin < MAX_SPIN);
        if before.spin > 1e-3 {
            assert_ne!(after, before.transform);
        }
    }

    // Same seed, same starting field.
    let again = build(&config);
    let AnyScene::Sparkle(scene) = again.scene() else {
        panic!("expected the sparkle scene");
    };
    for (i, before) in initial.iter().enumerate() {
        assert_eq!(scene.field().transform(i), Some(before.transform));
    }
}
