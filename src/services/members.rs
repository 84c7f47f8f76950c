//! Member registry service

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, Member, MemberDetails, MemberQuery, UpdateMember},
        reservation::ReservationDetails,
    },
    repository::{reservations::ReservationFilter, Repository, Visibility},
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, query: &MemberQuery) -> AppResult<Vec<Member>> {
        self.repository.members_list(query).await
    }

    /// Active member with its current reservation count
    pub async fn get_by_id(&self, id: i32) -> AppResult<MemberDetails> {
        let member = self.repository.members_get_by_id(id, Visibility::Active).await?;
        let active_reservations = self.active_reservation_count(id).await?;
        Ok(MemberDetails {
            member,
            active_reservations,
        })
    }

    /// Reservations with status active and active flag set
    pub async fn active_reservation_count(&self, id: i32) -> AppResult<i64> {
        let mut conn = self.repository.pool.acquire().await?;
        self.repository
            .reservations_count_active_for_member(&mut conn, id)
            .await
    }

    pub async fn create(&self, mut data: CreateMember) -> AppResult<Member> {
        data.code = data.code.trim().to_string();

        if self.repository.members_code_exists(&data.code, None).await? {
            return Err(AppError::Conflict(format!("Code {} is already registered", data.code)));
        }

        let member = self.repository.members_create(&data).await?;
        tracing::info!("Member {} created with code {}", member.id, member.code);
        Ok(member)
    }

    pub async fn update(&self, id: i32, mut data: UpdateMember) -> AppResult<Member> {
        self.repository.members_get_by_id(id, Visibility::Active).await?;

        if let Some(code) = data.code.take() {
            let code = code.trim().to_string();
            if self.repository.members_code_exists(&code, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "Code {} is already used by another member",
                    code
                )));
            }
            data.code = Some(code);
        }

        self.repository.members_update(id, &data).await
    }

    /// Logical delete; existing reservations keep their snapshot names
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.members_deactivate(id).await?;
        tracing::info!("Member {} deactivated", id);
        Ok(())
    }

    /// Reservations of an active member
    pub async fn reservations(&self, id: i32, include_inactive: Option<bool>) -> AppResult<Vec<ReservationDetails>> {
        if !self.repository.members_exists_active(id).await? {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }

        let filter = ReservationFilter {
            member_id: Some(id),
            visibility: Visibility::from_flag(include_inactive),
            ..Default::default()
        };
        self.repository.reservations_list(&filter).await
    }
}
