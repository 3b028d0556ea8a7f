use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Coupons::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Coupons::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Coupons::Code)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Coupons::Description).text().null())
                    .col(
                        ColumnDef::new(Coupons::CouponType)
                            .string()
                            .not_null()
                            .default("PERCENTAGE"),
                    )
                    .col(ColumnDef::new(Coupons::DiscountValue).decimal().not_null())
                    .col(ColumnDef::new(Coupons::MaxDiscountAmount).decimal().null())
                    .col(
                        ColumnDef::new(Coupons::MinOrderValue)
                            .decimal()
                            .not_null()
                            .default(0.0),
                    )
                    .col(ColumnDef::new(Coupons::ValidFrom).timestamp().not_null())
                    .col(ColumnDef::new(Coupons::ValidUntil).timestamp().not_null())
                    .col(
                        ColumnDef::new(Coupons::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Coupons::LimitPerUser)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Coupons::TotalUsageLimit).integer().null())
                    .col(
                        ColumnDef::new(Coupons::TimesUsed)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Coupons::IsWheelCoupon)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Coupons::WheelLabel).string().null())
                    .col(
                        ColumnDef::new(Coupons::WheelColor)
                            .string()
                            .not_null()
                            .default("#8B3E48"),
                    )
                    .col(
                        ColumnDef::new(Coupons::WinProbability)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Coupons::DailyGlobalLimit)
                            .integer()
                            .not_null()
                            .default(10),
                    )
                    .col(ColumnDef::new(Coupons::LastUsedDate).date().null())
                    .col(
                        ColumnDef::new(Coupons::TodayUsageCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WheelUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WheelUsages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WheelUsages::OrderRef)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(
                        ColumnDef::new(WheelUsages::CouponId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WheelUsages::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_wheel_usages_coupon")
                            .from(WheelUsages::Table, WheelUsages::CouponId)
                            .to(Coupons::Table, Coupons::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WheelUsages::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Coupons::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Coupons {
    Table,
    Id,
    Code,
    Description,
    CouponType,
    DiscountValue,
    MaxDiscountAmount,
    MinOrderValue,
    ValidFrom,
    ValidUntil,
    Active,
    LimitPerUser,
    TotalUsageLimit,
    TimesUsed,
    IsWheelCoupon,
    WheelLabel,
    WheelColor,
    WinProbability,
    DailyGlobalLimit,
    LastUsedDate,
    TodayUsageCount,
}

#[derive(DeriveIden)]
pub enum WheelUsages {
    Table,
    Id,
    OrderRef,
    CouponId,
    CreatedAt,
}
