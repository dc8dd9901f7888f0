use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240801_000001_create_buildings_and_rooms::Migration),
            Box::new(m20240801_000002_create_room_availability::Migration),
            Box::new(m20240801_000003_create_room_reservations::Migration),
            Box::new(m20240801_000004_create_people_tables::Migration),
            Box::new(m20240801_000005_create_announcements::Migration),
        ]
    }
}

mod m20240801_000001_create_buildings_and_rooms {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000001_create_buildings_and_rooms"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Buildings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Buildings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Buildings::Name).string().not_null())
                        .col(ColumnDef::new(Buildings::Code).string().not_null().unique_key())
                        .col(ColumnDef::new(Buildings::Description).text().null())
                        .col(
                            ColumnDef::new(Buildings::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Rooms::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Rooms::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Rooms::Name).string().not_null())
                        .col(ColumnDef::new(Rooms::RoomType).string().not_null())
                        .col(ColumnDef::new(Rooms::Capacity).integer().not_null().default(0))
                        .col(ColumnDef::new(Rooms::Floor).integer().not_null().default(1))
                        .col(ColumnDef::new(Rooms::BuildingId).uuid().not_null())
                        .col(
                            ColumnDef::new(Rooms::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Rooms::Status).string_len(32).null())
                        .col(ColumnDef::new(Rooms::CurrentOccupant).string().null())
                        .col(
                            ColumnDef::new(Rooms::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rooms_building")
                                .from(Rooms::Table, Rooms::BuildingId)
                                .to(Buildings::Table, Buildings::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_rooms_building_id")
                        .table(Rooms::Table)
                        .col(Rooms::BuildingId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Rooms::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Buildings::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub enum Buildings {
        Table,
        Id,
        Name,
        Code,
        Description,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub enum Rooms {
        Table,
        Id,
        Name,
        RoomType,
        Capacity,
        Floor,
        BuildingId,
        IsAvailable,
        Status,
        CurrentOccupant,
        UpdatedAt,
    }
}

mod m20240801_000002_create_room_availability {
    use super::m20240801_000001_create_buildings_and_rooms::Rooms;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000002_create_room_availability"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RoomAvailability::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoomAvailability::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoomAvailability::RoomId).uuid().not_null())
                        .col(ColumnDef::new(RoomAvailability::IsAvailable).boolean().null())
                        .col(ColumnDef::new(RoomAvailability::Status).string_len(32).null())
                        .col(
                            ColumnDef::new(RoomAvailability::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoomAvailability::CreatedBy).uuid().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_room_availability_room")
                                .from(RoomAvailability::Table, RoomAvailability::RoomId)
                                .to(Rooms::Table, Rooms::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_room_availability_room_created")
                        .table(RoomAvailability::Table)
                        .col(RoomAvailability::RoomId)
                        .col(RoomAvailability::CreatedAt)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoomAvailability::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RoomAvailability {
        Table,
        Id,
        RoomId,
        IsAvailable,
        Status,
        CreatedAt,
        CreatedBy,
    }
}

mod m20240801_000003_create_room_reservations {
    use super::m20240801_000001_create_buildings_and_rooms::Rooms;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000003_create_room_reservations"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RoomReservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RoomReservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RoomReservations::RoomId).uuid().not_null())
                        .col(ColumnDef::new(RoomReservations::FacultyId).uuid().not_null())
                        .col(ColumnDef::new(RoomReservations::FacultyName).string().not_null())
                        .col(ColumnDef::new(RoomReservations::Date).date().not_null())
                        .col(ColumnDef::new(RoomReservations::StartTime).time().not_null())
                        .col(ColumnDef::new(RoomReservations::EndTime).time().not_null())
                        .col(ColumnDef::new(RoomReservations::Purpose).text().not_null())
                        .col(
                            ColumnDef::new(RoomReservations::Status)
                                .string_len(32)
                                .not_null()
                                .default("scheduled"),
                        )
                        .col(
                            ColumnDef::new(RoomReservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_room_reservations_room")
                                .from(RoomReservations::Table, RoomReservations::RoomId)
                                .to(Rooms::Table, Rooms::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_room_reservations_room_date")
                        .table(RoomReservations::Table)
                        .col(RoomReservations::RoomId)
                        .col(RoomReservations::Date)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_room_reservations_faculty")
                        .table(RoomReservations::Table)
                        .col(RoomReservations::FacultyId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RoomReservations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum RoomReservations {
        Table,
        Id,
        RoomId,
        FacultyId,
        FacultyName,
        Date,
        StartTime,
        EndTime,
        Purpose,
        Status,
        CreatedAt,
    }
}

mod m20240801_000004_create_people_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000004_create_people_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Accounts::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Accounts::Email).string().not_null().unique_key())
                        .col(
                            ColumnDef::new(Accounts::AuthProvider)
                                .string_len(32)
                                .not_null()
                                .default("email"),
                        )
                        .col(
                            ColumnDef::new(Accounts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Profiles::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Profiles::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Profiles::FullName).string().not_null())
                        .col(ColumnDef::new(Profiles::Email).string().not_null())
                        .col(
                            ColumnDef::new(Profiles::Role)
                                .string_len(32)
                                .not_null()
                                .default("student"),
                        )
                        .col(ColumnDef::new(Profiles::Department).string().null())
                        .col(
                            ColumnDef::new(Profiles::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(FacultyRequests::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FacultyRequests::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FacultyRequests::UserId).uuid().not_null())
                        .col(ColumnDef::new(FacultyRequests::Name).string().not_null())
                        .col(ColumnDef::new(FacultyRequests::Email).string().not_null())
                        .col(ColumnDef::new(FacultyRequests::Department).string().not_null())
                        .col(
                            ColumnDef::new(FacultyRequests::Status)
                                .string_len(32)
                                .not_null()
                                .default("pending"),
                        )
                        .col(
                            ColumnDef::new(FacultyRequests::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_faculty_requests_user")
                        .table(FacultyRequests::Table)
                        .col(FacultyRequests::UserId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FacultyRequests::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Profiles::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Accounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Accounts {
        Table,
        Id,
        Email,
        AuthProvider,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Profiles {
        Table,
        Id,
        FullName,
        Email,
        Role,
        Department,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum FacultyRequests {
        Table,
        Id,
        UserId,
        Name,
        Email,
        Department,
        Status,
        CreatedAt,
    }
}

mod m20240801_000005_create_announcements {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240801_000005_create_announcements"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Announcements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Announcements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Announcements::Title).string().not_null())
                        .col(ColumnDef::new(Announcements::Body).text().not_null())
                        .col(ColumnDef::new(Announcements::CreatedBy).uuid().not_null())
                        .col(
                            ColumnDef::new(Announcements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Announcements::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Announcements {
        Table,
        Id,
        Title,
        Body,
        CreatedBy,
        CreatedAt,
    }
}
