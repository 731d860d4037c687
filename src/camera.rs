use nalgebra::{Matrix4, Perspective3, Point3};

use crate::geometry::{Fp, Ray, Vec3f};

const Z_NEAR: Fp = 0.1;
const Z_FAR: Fp = 100.0;
const MIN_DISTANCE: Fp = 0.2;
const MAX_PITCH: Fp = 1.5;

/// Camera collaborator. The view-projection matrix only feeds the debug
/// overlay; the kernel builds its own ray basis via [`CameraBasis`].
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    look_from: Vec3f,
    look_at: Vec3f,
    vup: Vec3f,
    /// Vertical field of view in degrees.
    vfov: Fp,
    aspect_ratio: Fp,
    /// Aperture cone angle in degrees; zero disables depth of field.
    defocus_angle: Fp,
    focus_dist: Fp,
    view_projection: Matrix4<Fp>,
}

impl Camera {
    pub fn new(look_from: Vec3f, look_at: Vec3f, vfov: Fp, aspect_ratio: Fp) -> Self {
        let mut camera = Camera {
            look_from,
            look_at,
            vup: Vec3f::y(),
            vfov,
            aspect_ratio,
            defocus_angle: 0.0,
            focus_dist: (look_from - look_at).norm(),
            view_projection: Matrix4::identity(),
        };
        camera.update_view_projection();
        camera
    }

    pub fn with_defocus(mut self, defocus_angle: Fp, focus_dist: Fp) -> Self {
        self.defocus_angle = defocus_angle.max(0.0);
        self.focus_dist = focus_dist.max(Fp::EPSILON);
        self
    }

    pub fn look_from(&self) -> Vec3f {
        self.look_from
    }

    pub fn look_at(&self) -> Vec3f {
        self.look_at
    }

    pub fn vup(&self) -> Vec3f {
        self.vup
    }

    pub fn vfov(&self) -> Fp {
        self.vfov
    }

    pub fn aspect_ratio(&self) -> Fp {
        self.aspect_ratio
    }

    pub fn defocus_angle(&self) -> Fp {
        self.defocus_angle
    }

    pub fn focus_dist(&self) -> Fp {
        self.focus_dist
    }

    pub fn view_projection(&self) -> &Matrix4<Fp> {
        &self.view_projection
    }

    pub fn set_position(&mut self, look_from: Vec3f) {
        self.look_from = look_from;
        self.update_view_projection();
    }

    pub fn set_target(&mut self, look_at: Vec3f) {
        self.look_at = look_at;
        self.update_view_projection();
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: Fp) {
        self.aspect_ratio = aspect_ratio;
        self.update_view_projection();
    }

    /// Rotates the position around the target by `yaw` and `pitch` radians.
    pub fn orbit(&mut self, yaw: Fp, pitch: Fp) {
        let offset = self.look_from - self.look_at;
        let radius = offset.norm();
        if radius <= Fp::EPSILON {
            return;
        }
        let current_yaw = offset.x.atan2(offset.z);
        let current_pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        let new_yaw = current_yaw + yaw;
        let new_pitch = (current_pitch + pitch).clamp(-MAX_PITCH, MAX_PITCH);
        let offset = Vec3f::new(
            radius * new_pitch.cos() * new_yaw.sin(),
            radius * new_pitch.sin(),
            radius * new_pitch.cos() * new_yaw.cos(),
        );
        self.set_position(self.look_at + offset);
    }

    pub fn zoom(&mut self, delta: Fp) {
        let offset = self.look_from - self.look_at;
        let distance = (offset.norm() - delta).max(MIN_DISTANCE);
        if let Some(direction) = offset.try_normalize(Fp::EPSILON) {
            self.set_position(self.look_at + direction * distance);
        }
    }

    fn update_view_projection(&mut self) {
        let view = Matrix4::look_at_rh(
            &Point3::from(self.look_from),
            &Point3::from(self.look_at),
            &self.vup,
        );
        let projection =
            Perspective3::new(self.aspect_ratio, self.vfov.to_radians(), Z_NEAR, Z_FAR);
        self.view_projection = projection.to_homogeneous() * view;
    }
}

/// Per-frame ray generation basis derived from the camera parameters.
#[derive(Clone, Copy, Debug)]
pub struct CameraBasis {
    center: Vec3f,
    pixel00_loc: Vec3f,
    pixel_delta_u: Vec3f,
    pixel_delta_v: Vec3f,
    defocus_disk_u: Vec3f,
    defocus_disk_v: Vec3f,
    defocus: bool,
}

impl CameraBasis {
    pub fn new(camera: &Camera, width: u32, height: u32) -> Self {
        let width = width.max(1) as Fp;
        let height = height.max(1) as Fp;
        let h = (camera.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * camera.focus_dist;
        let viewport_width = viewport_height * camera.aspect_ratio;

        let w = (camera.look_from - camera.look_at)
            .try_normalize(Fp::EPSILON)
            .unwrap_or_else(Vec3f::z);
        let u = camera
            .vup
            .cross(&w)
            .try_normalize(Fp::EPSILON)
            .unwrap_or_else(Vec3f::x);
        let v = w.cross(&u);

        let viewport_u = u * viewport_width;
        let viewport_v = -v * viewport_height;
        let pixel_delta_u = viewport_u / width;
        let pixel_delta_v = viewport_v / height;
        let viewport_upper_left =
            camera.look_from - w * camera.focus_dist - viewport_u / 2.0 - viewport_v / 2.0;

        let defocus_radius = camera.focus_dist * (camera.defocus_angle.to_radians() / 2.0).tan();
        CameraBasis {
            center: camera.look_from,
            pixel00_loc: viewport_upper_left + (pixel_delta_u + pixel_delta_v) * 0.5,
            pixel_delta_u,
            pixel_delta_v,
            defocus_disk_u: u * defocus_radius,
            defocus_disk_v: v * defocus_radius,
            defocus: camera.defocus_angle > 0.0,
        }
    }

    /// Ray through pixel `(x, y)`. `jitter` is the sub-pixel offset in
    /// `[-0.5, 0.5)`, `disk` a point in the unit disk.
    pub fn get_ray(&self, x: u32, y: u32, jitter: (Fp, Fp), disk: (Fp, Fp)) -> Ray {
        let pixel_sample = self.pixel00_loc
            + self.pixel_delta_u * (x as Fp + jitter.0)
            + self.pixel_delta_v * (y as Fp + jitter.1);
        let origin = if self.defocus {
            self.center + self.defocus_disk_u * disk.0 + self.defocus_disk_v * disk.1
        } else {
            self.center
        };
        Ray::new(origin, pixel_sample - origin)
    }
}
