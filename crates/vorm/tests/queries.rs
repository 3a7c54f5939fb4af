use std::sync::Arc;

use chrono::NaiveDateTime;
use vorm::{
    Aggregate, AggregateMetadata, Defaults, Dialect, MetadataBuilder, QueryGenerator, Structure,
    StructuralMapper, generator_for,
};

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(entity = "Users", rename_all = "PascalCase")]
struct User {
    #[orm(key, identity)]
    id: i64,
    name: String,
    email: String,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(entity = "Logins", rename_all = "PascalCase")]
struct Login {
    #[orm(key)]
    username: String,
    #[orm(key)]
    password: String,
    last_seen: Option<NaiveDateTime>,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(entity = "Posts", schema = "public", dialect = "postgres", rename_all = "PascalCase")]
struct Post {
    #[orm(key, identity)]
    id: i32,
    title: String,
    #[orm(default)]
    published: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(schema = "dbo", dialect = "sqlserver", triggers, rename_all = "PascalCase")]
struct Audit {
    #[orm(key, identity)]
    id: i64,
    message: String,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(schema = "public", dialect = "pg")]
struct Tag {
    #[orm(key)]
    name: String,
}

#[derive(Debug, Default, Clone, PartialEq, Structure)]
#[orm(rename_all = "PascalCase")]
struct ShipmentKey {
    tenant: i32,
    number: i64,
}

#[derive(Debug, Default, Clone, PartialEq, Structure, Aggregate)]
#[orm(entity = "Shipments", schema = "public", dialect = "postgres", rename_all = "PascalCase")]
struct Shipment {
    #[orm(key)]
    key: ShipmentKey,
    weight: i64,
}

fn mapper() -> Arc<StructuralMapper> {
    Arc::new(StructuralMapper::default())
}

fn metadata<T: Aggregate>(
    mapper: &StructuralMapper,
    schema: Option<&str>,
    dialect: Dialect,
) -> Arc<AggregateMetadata> {
    let mut builder = T::configure(MetadataBuilder::new().unwrap())
        .unwrap()
        .dialect(dialect);
    if let Some(schema) = schema {
        builder = builder.schema(schema);
    }
    Arc::new(builder.build(mapper).unwrap())
}

fn generator<T: Aggregate>(schema: Option<&str>, dialect: Dialect) -> Box<dyn QueryGenerator<T>> {
    let mapper = mapper();
    let metadata = metadata::<T>(&mapper, schema, dialect);
    generator_for::<T>(mapper, metadata).unwrap()
}

fn derived<T: Aggregate>() -> Box<dyn QueryGenerator<T>> {
    let mapper = mapper();
    let metadata = Arc::new(T::metadata(&mapper).unwrap());
    generator_for::<T>(mapper, metadata).unwrap()
}

fn user(id: i64) -> User {
    User {
        id,
        name: "Ada".into(),
        email: "ada@example.com".into(),
    }
}

#[test]
fn sqlserver_user_queries() {
    let g = generator::<User>(Some("dbo"), Dialect::SqlServer);
    assert_eq!(
        g.generate_get_all_query().unwrap(),
        "SELECT [dbo].[Users].[Id], [dbo].[Users].[Name], [dbo].[Users].[Email] FROM [dbo].[Users];"
    );
    assert_eq!(
        g.generate_get_query().unwrap(),
        "SELECT [dbo].[Users].[Id], [dbo].[Users].[Name], [dbo].[Users].[Email] \
         FROM [dbo].[Users] WHERE [dbo].[Users].[Id] = @Id;"
    );
    assert_eq!(
        g.generate_insert_query(&user(0)).unwrap(),
        "INSERT INTO [dbo].[Users] ([Name], [Email]) \
         OUTPUT inserted.[Id], inserted.[Name], inserted.[Email] VALUES (@Name, @Email);"
    );
    assert_eq!(
        g.generate_update_query(&user(1)).unwrap(),
        "UPDATE [dbo].[Users] SET [Name] = @Name, [Email] = @Email \
         OUTPUT inserted.[Id], inserted.[Name], inserted.[Email] WHERE [dbo].[Users].[Id] = @Id;"
    );
    assert_eq!(
        g.generate_delete_query().unwrap(),
        "DELETE FROM [dbo].[Users] OUTPUT deleted.[Id], deleted.[Name], deleted.[Email] \
         WHERE [dbo].[Users].[Id] = @Id;"
    );
    assert_eq!(
        g.generate_property_list(Some("u")),
        "[u].[Id], [u].[Name], [u].[Email]"
    );
}

#[test]
fn postgres_user_queries() {
    let g = generator::<User>(Some("public"), Dialect::PostgreSql);
    assert_eq!(
        g.generate_get_all_query().unwrap(),
        "SELECT public.Users.Id, public.Users.Name, public.Users.Email FROM public.Users;"
    );
    assert_eq!(
        g.generate_insert_query(&user(0)).unwrap(),
        "INSERT INTO public.Users (Name, Email) VALUES (@Name, @Email) RETURNING Id, Name, Email;"
    );
    assert_eq!(
        g.generate_update_query(&user(3)).unwrap(),
        "UPDATE public.Users SET Name = @Name, Email = @Email \
         WHERE public.Users.Id = @Id RETURNING Id, Name, Email;"
    );
    assert_eq!(
        g.generate_delete_query().unwrap(),
        "DELETE FROM public.Users WHERE public.Users.Id = @Id RETURNING Id, Name, Email;"
    );
}

#[test]
fn mysql_user_queries() {
    let g = generator::<User>(None, Dialect::MySql);
    let select = "SELECT Users.Id, Users.Name, Users.Email FROM Users";
    assert_eq!(g.generate_get_all_query().unwrap(), format!("{select};"));
    assert_eq!(
        g.generate_insert_query(&user(0)).unwrap(),
        format!(
            "INSERT INTO Users (Name, Email) VALUES (@Name, @Email); \
             {select} WHERE Users.Id = LAST_INSERT_ID();"
        )
    );
    assert_eq!(
        g.generate_update_query(&user(2)).unwrap(),
        format!(
            "UPDATE Users SET Name = @Name, Email = @Email WHERE Users.Id = @Id; \
             {select} WHERE Users.Id = @Id;"
        )
    );
    assert_eq!(
        g.generate_delete_query().unwrap(),
        format!("{select} WHERE Users.Id = @Id; DELETE FROM Users WHERE Users.Id = @Id;")
    );
}

#[test]
fn composite_key_is_and_joined_in_declaration_order() {
    let g = generator::<Login>(Some("public"), Dialect::PostgreSql);
    assert_eq!(
        g.generate_get_query().unwrap(),
        "SELECT public.Logins.Username, public.Logins.Password, public.Logins.LastSeen \
         FROM public.Logins \
         WHERE public.Logins.Username = @Username AND public.Logins.Password = @Password;"
    );
}

#[test]
fn native_upserts_key_on_the_full_key() {
    let login = Login {
        username: "ada".into(),
        password: "secret".into(),
        last_seen: None,
    };

    let g = generator::<Login>(Some("public"), Dialect::PostgreSql);
    assert_eq!(
        g.generate_upsert_query(&login).unwrap(),
        "INSERT INTO public.Logins (Username, Password, LastSeen) \
         VALUES (@Username, @Password, @LastSeen) \
         ON CONFLICT (Username, Password) DO UPDATE SET LastSeen = EXCLUDED.LastSeen \
         RETURNING Username, Password, LastSeen;"
    );

    let g = generator::<Login>(None, Dialect::MySql);
    assert_eq!(
        g.generate_upsert_query(&login).unwrap(),
        "INSERT INTO Logins (Username, Password, LastSeen) \
         VALUES (@Username, @Password, @LastSeen) \
         ON DUPLICATE KEY UPDATE LastSeen = VALUES(LastSeen); \
         SELECT Logins.Username, Logins.Password, Logins.LastSeen FROM Logins \
         WHERE Logins.Username = @Username AND Logins.Password = @Password;"
    );

    let g = generator::<Login>(Some("dbo"), Dialect::SqlServer);
    assert!(g.generate_upsert_query(&login).unwrap_err().is_unsupported());
}

#[test]
fn upsert_without_updatable_columns_is_unsupported() {
    let g = derived::<Tag>();
    let err = g
        .generate_upsert_query(&Tag { name: "rust".into() })
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(err.to_string().contains("no updatable columns"));
    assert!(g.generate_update_query(&Tag::default()).unwrap_err().is_unsupported());
}

#[test]
fn entity_defaults_to_type_name() {
    let g = derived::<Tag>();
    assert_eq!(
        g.generate_get_all_query().unwrap(),
        "SELECT public.Tag.name FROM public.Tag;"
    );
}

#[test]
fn default_constrained_column_skipped_while_at_default() {
    let g = derived::<Post>();
    let draft = Post {
        id: 0,
        title: "Hello".into(),
        published: false,
    };
    assert_eq!(
        g.generate_insert_query(&draft).unwrap(),
        "INSERT INTO public.Posts (Title) VALUES (@Title) RETURNING Id, Title, Published;"
    );

    let live = Post {
        published: true,
        ..draft.clone()
    };
    assert_eq!(
        g.generate_insert_query(&live).unwrap(),
        "INSERT INTO public.Posts (Title, Published) VALUES (@Title, @Published) \
         RETURNING Id, Title, Published;"
    );
}

#[test]
fn upsert_picks_insert_or_update_by_identity() {
    let g = derived::<Post>();
    let new = Post {
        title: "New".into(),
        ..Post::default()
    };
    let existing = Post {
        id: 5,
        ..new.clone()
    };
    assert_eq!(
        g.generate_upsert_query(&new).unwrap(),
        g.generate_insert_query(&new).unwrap()
    );
    assert_eq!(
        g.generate_upsert_query(&existing).unwrap(),
        g.generate_update_query(&existing).unwrap()
    );
}

#[test]
fn triggers_replace_output_clauses() {
    let g = derived::<Audit>();
    let sql = g
        .generate_insert_query(&Audit {
            id: 0,
            message: "hi".into(),
        })
        .unwrap();
    assert_eq!(
        sql,
        "INSERT INTO [dbo].[Audit] ([Message]) VALUES (@Message); \
         SELECT [dbo].[Audit].[Id], [dbo].[Audit].[Message] FROM [dbo].[Audit] \
         WHERE [dbo].[Audit].[Id] = SCOPE_IDENTITY();"
    );
}

#[test]
fn defaults_fill_schema_and_dialect() {
    let mapper = mapper();
    let defaults = Defaults::new().schema("app").dialect(Dialect::PostgreSql);

    let mut metadata = User::metadata(&mapper).unwrap();
    metadata.apply_defaults(&defaults);
    assert_eq!(metadata.schema(), Some("app"));
    let g = generator_for::<User>(mapper.clone(), Arc::new(metadata)).unwrap();
    assert_eq!(g.dialect(), Dialect::PostgreSql);
    assert!(g.generate_get_all_query().unwrap().ends_with("FROM app.Users;"));

    let mut metadata = User::metadata(&mapper).unwrap();
    metadata.apply_defaults(&Defaults::new().schema("app").dialect(Dialect::MySql));
    assert_eq!(metadata.schema(), None);
    let g = generator_for::<User>(mapper, Arc::new(metadata)).unwrap();
    assert!(g.generate_get_all_query().unwrap().ends_with("FROM Users;"));
}

#[test]
fn schema_rules_are_checked_per_dialect() {
    let mapper = mapper();
    let err = generator_for::<User>(
        mapper.clone(),
        metadata::<User>(&mapper, Some("dbo"), Dialect::MySql),
    )
    .err()
    .unwrap();
    assert!(err.is_configuration());

    let err = generator_for::<User>(
        mapper.clone(),
        metadata::<User>(&mapper, None, Dialect::SqlServer),
    )
    .err()
    .unwrap();
    assert!(err.is_configuration());
}

#[test]
fn value_object_key_expands_to_one_term_per_leaf() {
    let g = derived::<Shipment>();
    let keys = "public.Shipments.Key_Tenant = @Key_Tenant \
                AND public.Shipments.Key_Number = @Key_Number";
    assert_eq!(
        g.generate_get_query().unwrap(),
        format!(
            "SELECT public.Shipments.Key_Tenant, public.Shipments.Key_Number, \
             public.Shipments.Weight FROM public.Shipments WHERE {keys};"
        )
    );

    let shipment = Shipment {
        key: ShipmentKey {
            tenant: 1,
            number: 2,
        },
        weight: 30,
    };
    assert_eq!(
        g.generate_update_query(&shipment).unwrap(),
        format!(
            "UPDATE public.Shipments SET Weight = @Weight WHERE {keys} \
             RETURNING Key_Tenant, Key_Number, Weight;"
        )
    );
    assert_eq!(
        g.generate_upsert_query(&shipment).unwrap(),
        "INSERT INTO public.Shipments (Key_Tenant, Key_Number, Weight) \
         VALUES (@Key_Tenant, @Key_Number, @Weight) \
         ON CONFLICT (Key_Tenant, Key_Number) DO UPDATE SET Weight = EXCLUDED.Weight \
         RETURNING Key_Tenant, Key_Number, Weight;"
    );
}
