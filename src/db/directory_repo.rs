// src/db/directory_repo.rs

use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::common::error::AppError;

/// Consultas de existência nos cadastros (clínicas, cadeiras, médicos, pacientes).
/// O CRUD desses cadastros vive em outro serviço.
#[derive(Clone, Default)]
pub struct DirectoryRepository;

impl DirectoryRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn clinic_exists<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM clinics WHERE id = $1 AND organization_id = $2)",
        )
        .bind(clinic_id)
        .bind(organization_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    /// A cadeira precisa pertencer à clínica da consulta.
    pub async fn unit_exists<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
        unit_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM units
                WHERE id = $1 AND organization_id = $2 AND clinic_id = $3 AND is_active
            )
            "#,
        )
        .bind(unit_id)
        .bind(organization_id)
        .bind(clinic_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    pub async fn doctor_exists<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        doctor_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM doctors WHERE id = $1 AND organization_id = $2 AND is_active)",
        )
        .bind(doctor_id)
        .bind(organization_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }

    pub async fn patient_exists<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        patient_id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = $1 AND organization_id = $2)",
        )
        .bind(patient_id)
        .bind(organization_id)
        .fetch_one(executor)
        .await?;

        Ok(exists)
    }
}
