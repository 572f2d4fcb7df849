use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable foreign keys for SQLite
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            manager
                .get_connection()
                .execute_unprepared("PRAGMA foreign_keys = ON")
                .await?;
        }

        // Create consents table, keyed by (consent_id, org_id)
        manager
            .create_table(
                Table::create()
                    .table(Consents::Table)
                    .if_not_exists()
                    .col(string(Consents::ConsentId))
                    .col(string(Consents::OrgId))
                    .col(string(Consents::ClientId))
                    .col(string(Consents::ConsentType))
                    .col(string(Consents::CurrentStatus))
                    .col(integer_null(Consents::ConsentFrequency))
                    .col(big_integer_null(Consents::ValidityTime))
                    .col(boolean_null(Consents::RecurringIndicator))
                    .col(big_integer_null(Consents::DataAccessValidityDuration))
                    .col(big_integer(Consents::CreatedTime))
                    .col(big_integer(Consents::UpdatedTime))
                    .primary_key(
                        Index::create()
                            .col(Consents::ConsentId)
                            .col(Consents::OrgId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consents_org_created")
                    .table(Consents::Table)
                    .col(Consents::OrgId)
                    .col(Consents::CreatedTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consents_org_client")
                    .table(Consents::Table)
                    .col(Consents::OrgId)
                    .col(Consents::ClientId)
                    .to_owned(),
            )
            .await?;

        // Create consent_attributes table
        manager
            .create_table(
                Table::create()
                    .table(ConsentAttributes::Table)
                    .if_not_exists()
                    .col(string(ConsentAttributes::ConsentId))
                    .col(string(ConsentAttributes::OrgId))
                    .col(string(ConsentAttributes::AttKey))
                    .col(text(ConsentAttributes::AttValue))
                    .primary_key(
                        Index::create()
                            .col(ConsentAttributes::ConsentId)
                            .col(ConsentAttributes::OrgId)
                            .col(ConsentAttributes::AttKey),
                    )
                    .to_owned(),
            )
            .await?;

        // Attribute search looks up by key (and value) within an org
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_attributes_org_key")
                    .table(ConsentAttributes::Table)
                    .col(ConsentAttributes::OrgId)
                    .col(ConsentAttributes::AttKey)
                    .to_owned(),
            )
            .await?;

        // Create consent_status_audits table
        manager
            .create_table(
                Table::create()
                    .table(ConsentStatusAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentStatusAudits::StatusAuditId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(ConsentStatusAudits::ConsentId))
                    .col(string(ConsentStatusAudits::OrgId))
                    .col(string(ConsentStatusAudits::CurrentStatus))
                    .col(string_null(ConsentStatusAudits::PreviousStatus))
                    .col(big_integer(ConsentStatusAudits::ActionTime))
                    .col(string_null(ConsentStatusAudits::ActionBy))
                    .col(text_null(ConsentStatusAudits::Reason))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_status_audits_consent")
                    .table(ConsentStatusAudits::Table)
                    .col(ConsentStatusAudits::ConsentId)
                    .col(ConsentStatusAudits::OrgId)
                    .to_owned(),
            )
            .await?;

        // Create consent_auth_resources table
        manager
            .create_table(
                Table::create()
                    .table(ConsentAuthResources::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentAuthResources::AuthId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(ConsentAuthResources::ConsentId))
                    .col(string(ConsentAuthResources::OrgId))
                    .col(string(ConsentAuthResources::AuthType))
                    .col(string_null(ConsentAuthResources::UserId))
                    .col(string(ConsentAuthResources::AuthStatus))
                    .col(big_integer(ConsentAuthResources::UpdatedTime))
                    .col(text_null(ConsentAuthResources::Resources))
                    .col(text_null(ConsentAuthResources::ApprovedPurposeDetails))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_auth_resources_consent")
                    .table(ConsentAuthResources::Table)
                    .col(ConsentAuthResources::ConsentId)
                    .col(ConsentAuthResources::OrgId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_auth_resources_user")
                    .table(ConsentAuthResources::Table)
                    .col(ConsentAuthResources::OrgId)
                    .col(ConsentAuthResources::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsentAuthResources::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConsentStatusAudits::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConsentAttributes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Consents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Consents {
    Table,
    ConsentId,
    OrgId,
    ClientId,
    ConsentType,
    CurrentStatus,
    ConsentFrequency,
    ValidityTime,
    RecurringIndicator,
    DataAccessValidityDuration,
    CreatedTime,
    UpdatedTime,
}

#[derive(DeriveIden)]
enum ConsentAttributes {
    Table,
    ConsentId,
    OrgId,
    AttKey,
    AttValue,
}

#[derive(DeriveIden)]
enum ConsentStatusAudits {
    Table,
    StatusAuditId,
    ConsentId,
    OrgId,
    CurrentStatus,
    PreviousStatus,
    ActionTime,
    ActionBy,
    Reason,
}

#[derive(DeriveIden)]
enum ConsentAuthResources {
    Table,
    AuthId,
    ConsentId,
    OrgId,
    AuthType,
    UserId,
    AuthStatus,
    UpdatedTime,
    Resources,
    ApprovedPurposeDetails,
}
