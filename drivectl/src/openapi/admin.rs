//! OpenAPI documentation for the admin REST resources (`/admin/api/v1/*`).

use utoipa::OpenApi;

use super::extra_types;
use crate::api;
use crate::api::models::{
    instructors::{InstructorCreate, InstructorFunction, InstructorResponse, InstructorStatus, InstructorUpdate},
    license_categories::LicenseCategoryResponse,
    profiles::{ProfileResponse, ProfileStatus, ProfileUpdate, Role},
    students::{AccessStatus, PaymentStatus, StudentCreate, StudentResponse, StudentStatus, StudentUpdate},
};
use crate::deletion::DeletionReport;

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/admin/api/v1", description = "Admin API server")
    ),
    paths(
        api::handlers::students::list_students,
        api::handlers::students::create_student,
        api::handlers::students::get_student,
        api::handlers::students::update_student,
        api::handlers::students::delete_student,
        api::handlers::students::upload_student_avatar,
        api::handlers::students::remove_student_avatar,
        api::handlers::instructors::list_instructors,
        api::handlers::instructors::create_instructor,
        api::handlers::instructors::get_instructor,
        api::handlers::instructors::update_instructor,
        api::handlers::instructors::delete_instructor,
        api::handlers::instructors::upload_instructor_avatar,
        api::handlers::instructors::remove_instructor_avatar,
        api::handlers::profiles::get_profile,
        api::handlers::profiles::update_profile,
        api::handlers::profiles::delete_profile,
        api::handlers::profiles::upload_profile_avatar,
        api::handlers::profiles::remove_profile_avatar,
        api::handlers::license_categories::list_license_categories,
        api::handlers::license_categories::get_license_category,
    ),
    components(
        schemas(
            StudentCreate,
            StudentUpdate,
            StudentResponse,
            StudentStatus,
            PaymentStatus,
            AccessStatus,
            InstructorCreate,
            InstructorUpdate,
            InstructorResponse,
            InstructorStatus,
            InstructorFunction,
            ProfileUpdate,
            ProfileResponse,
            ProfileStatus,
            Role,
            LicenseCategoryResponse,
            DeletionReport,
            extra_types::ErrorResponse,
        )
    ),
    tags(
        (name = "students", description = "Student enrollment records. Each student owns a profile and an identity account."),
        (name = "instructors", description = "Instructor records. Deleting an instructor unassigns their students."),
        (name = "profiles", description = "User profiles shared by every role"),
        (name = "license_categories", description = "Driving license categories"),
    ),
    info(
        title = "drivectl Admin API",
        version = "1.0.0",
        description = "Administrative API for students, instructors and profiles, including avatar management.

Error responses have the shape `{\"error\": \"...\", \"details\": \"...\"}`. `details` is present only for server-side failures.",
    )
)]
pub struct AdminApiDoc;
