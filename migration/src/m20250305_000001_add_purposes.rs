use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create consent_purposes catalog table
        manager
            .create_table(
                Table::create()
                    .table(ConsentPurposes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ConsentPurposes::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(ConsentPurposes::OrgId))
                    .col(string(ConsentPurposes::Name))
                    .col(text_null(ConsentPurposes::Description))
                    .col(string(ConsentPurposes::Type))
                    .col(text_null(ConsentPurposes::Value))
                    .col(big_integer(ConsentPurposes::CreatedTime))
                    .col(big_integer(ConsentPurposes::UpdatedTime))
                    .to_owned(),
            )
            .await?;

        // Purpose names are unique within an organization
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_purposes_org_name")
                    .table(ConsentPurposes::Table)
                    .col(ConsentPurposes::OrgId)
                    .col(ConsentPurposes::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create consent_purpose_mappings join table
        manager
            .create_table(
                Table::create()
                    .table(ConsentPurposeMappings::Table)
                    .if_not_exists()
                    .col(string(ConsentPurposeMappings::ConsentId))
                    .col(string(ConsentPurposeMappings::OrgId))
                    .col(string(ConsentPurposeMappings::PurposeId))
                    .col(text_null(ConsentPurposeMappings::Value))
                    .col(
                        ColumnDef::new(ConsentPurposeMappings::IsUserApproved)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(ConsentPurposeMappings::IsMandatory)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .primary_key(
                        Index::create()
                            .col(ConsentPurposeMappings::ConsentId)
                            .col(ConsentPurposeMappings::OrgId)
                            .col(ConsentPurposeMappings::PurposeId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consent_purpose_mappings_purpose")
                            .from(ConsentPurposeMappings::Table, ConsentPurposeMappings::PurposeId)
                            .to(ConsentPurposes::Table, ConsentPurposes::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_consent_purpose_mappings_purpose")
                    .table(ConsentPurposeMappings::Table)
                    .col(ConsentPurposeMappings::PurposeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ConsentPurposeMappings::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(ConsentPurposes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum ConsentPurposes {
    Table,
    Id,
    OrgId,
    Name,
    Description,
    Type,
    Value,
    CreatedTime,
    UpdatedTime,
}

#[derive(DeriveIden)]
enum ConsentPurposeMappings {
    Table,
    ConsentId,
    OrgId,
    PurposeId,
    Value,
    IsUserApproved,
    IsMandatory,
}
