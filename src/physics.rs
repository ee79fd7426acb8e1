//! Rigid-body simulation.
//!
//! [`PhysicsWorld`] wraps one `rapier3d` pipeline. Bodies are described by an
//! [`Impostor`], a simple stand-in shape with mass and restitution, and are addressed
//! afterwards through the returned [`ImpostorHandle`].

use std::num::NonZeroUsize;

use instant::Duration;
use rapier3d::prelude::*;

use crate::{
    config::{PhysicsConfig, WorldGravity},
    error::StartupError,
};

/// Step length used when the world does not follow the frame delta.
pub const FIXED_STEP: f32 = 1.0 / 60.0;
/// Upper bound for a single step, so a stalled frame does not tunnel bodies.
pub const MAX_STEP: f32 = 0.1;
/// Friction of every impostor. Contact friction is the product of both bodies'.
pub const IMPOSTOR_FRICTION: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpostorShape {
    Sphere { radius: f32 },
    Box { half_extents: cgmath::Vector3<f32> },
}

/// Collision stand-in for a mesh. A mass of zero makes the body fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impostor {
    pub shape: ImpostorShape,
    pub mass: f32,
    pub restitution: f32,
    /// Collider centre relative to the mesh origin.
    pub offset: cgmath::Vector3<f32>,
}

impl Impostor {
    pub fn sphere(radius: f32, mass: f32, restitution: f32) -> Self {
        Self {
            shape: ImpostorShape::Sphere { radius },
            mass,
            restitution,
            offset: cgmath::Vector3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn cuboid(half_extents: cgmath::Vector3<f32>, mass: f32, restitution: f32) -> Self {
        Self {
            shape: ImpostorShape::Box { half_extents },
            mass,
            restitution,
            offset: cgmath::Vector3::new(0.0, 0.0, 0.0),
        }
    }

    pub fn with_offset(mut self, offset: cgmath::Vector3<f32>) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImpostorHandle {
    body: RigidBodyHandle,
    collider: ColliderHandle,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query_pipeline: QueryPipeline,
    use_frame_delta: bool,
    steps: u64,
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("use_frame_delta", &self.use_frame_delta)
            .field("steps", &self.steps)
            .finish()
    }
}

impl PhysicsWorld {
    pub fn new(gravity: &WorldGravity, config: &PhysicsConfig) -> Result<Self, StartupError> {
        let num_solver_iterations = NonZeroUsize::new(config.solver_iterations).ok_or_else(|| {
            StartupError::Physics("solver_iterations must be at least 1".to_string())
        })?;
        let g = gravity.physics_vector();
        let integration_parameters = IntegrationParameters {
            num_solver_iterations,
            dt: FIXED_STEP,
            ..IntegrationParameters::default()
        };
        log::info!(
            "Physics world: gravity {:?}, {} solver iterations, frame delta {}",
            g,
            num_solver_iterations,
            config.use_frame_delta
        );
        Ok(Self {
            gravity: vector![g.x, g.y, g.z],
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            use_frame_delta: config.use_frame_delta,
            steps: 0,
        })
    }

    pub fn gravity(&self) -> cgmath::Vector3<f32> {
        cgmath::Vector3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    pub fn solver_iterations(&self) -> usize {
        self.integration_parameters.num_solver_iterations.get()
    }

    pub fn uses_frame_delta(&self) -> bool {
        self.use_frame_delta
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of simulation steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Add a body for `impostor` with its mesh origin at `position`.
    pub fn add_body(&mut self, impostor: &Impostor, position: cgmath::Vector3<f32>) -> ImpostorHandle {
        let translation = vector![position.x, position.y, position.z];
        let body = if impostor.is_static() {
            RigidBodyBuilder::fixed().translation(translation)
        } else {
            RigidBodyBuilder::dynamic()
                .translation(translation)
                .ccd_enabled(true)
        };
        let body = self.bodies.insert(body.build());

        let collider = match impostor.shape {
            ImpostorShape::Sphere { radius } => ColliderBuilder::ball(radius),
            ImpostorShape::Box { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        }
        .translation(vector![impostor.offset.x, impostor.offset.y, impostor.offset.z])
        .restitution(impostor.restitution)
        .restitution_combine_rule(CoefficientCombineRule::Multiply)
        .friction(IMPOSTOR_FRICTION)
        .friction_combine_rule(CoefficientCombineRule::Multiply);
        let collider = if impostor.is_static() {
            collider.density(0.0)
        } else {
            collider.mass(impostor.mass)
        };
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);

        ImpostorHandle { body, collider }
    }

    pub fn body_position(&self, handle: ImpostorHandle) -> Option<cgmath::Vector3<f32>> {
        let t = self.bodies.get(handle.body)?.translation();
        Some(cgmath::Vector3::new(t.x, t.y, t.z))
    }

    pub fn body_rotation(&self, handle: ImpostorHandle) -> Option<cgmath::Quaternion<f32>> {
        let q = self.bodies.get(handle.body)?.rotation();
        Some(cgmath::Quaternion::new(q.w, q.i, q.j, q.k))
    }

    pub fn body_velocity(&self, handle: ImpostorHandle) -> Option<cgmath::Vector3<f32>> {
        let v = self.bodies.get(handle.body)?.linvel();
        Some(cgmath::Vector3::new(v.x, v.y, v.z))
    }

    pub fn is_fixed(&self, handle: ImpostorHandle) -> Option<bool> {
        Some(self.bodies.get(handle.body)?.is_fixed())
    }

    pub fn collider_mass(&self, handle: ImpostorHandle) -> Option<f32> {
        Some(self.colliders.get(handle.collider)?.mass())
    }

    pub fn collider_restitution(&self, handle: ImpostorHandle) -> Option<f32> {
        Some(self.colliders.get(handle.collider)?.restitution())
    }

    pub fn collider_friction(&self, handle: ImpostorHandle) -> Option<f32> {
        Some(self.colliders.get(handle.collider)?.friction())
    }

    /// Advance the simulation by one frame.
    ///
    /// With frame delta stepping the step is `dt` capped at [`MAX_STEP`], otherwise
    /// it is always [`FIXED_STEP`]. A zero delta does nothing.
    pub fn step(&mut self, dt: Duration) {
        let dt = if self.use_frame_delta {
            dt.as_secs_f32().min(MAX_STEP)
        } else {
            FIXED_STEP
        };
        if dt <= 0.0 {
            return;
        }
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &(),
            &(),
        );
        self.steps += 1;
    }
}
