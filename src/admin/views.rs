//! # Entity Views: Declarative Capability Table
//!
//! One [`EntityView`] per admin-visible table. The generic handlers in
//! `routes_entities` and the generic store in `db::entity_store` consume
//! these records; nothing else in the gateway is entity-specific except the
//! material file upload.
//!
//! All identifiers in a view are static and are the only ones ever
//! interpolated into SQL. Request input selects among them, never adds to them.

use super::fields::{FieldKind, FieldSpec};
use crate::domain::{
    AttestationKind, FeedbackKind, MaterialCategory, ProgressStatus, ScheduleKind, StudentStatus,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Detail,
    Create,
    Edit,
    Delete,
    BulkDelete,
    Export,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Detail => "detail",
            Operation::Create => "create",
            Operation::Edit => "edit",
            Operation::Delete => "delete",
            Operation::BulkDelete => "bulk_delete",
            Operation::Export => "export",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub list: bool,
    pub detail: bool,
    pub create: bool,
    pub edit: bool,
    pub delete: bool,
    pub bulk_delete: bool,
    pub export: bool,
}

impl Capabilities {
    pub const ALL: Capabilities = Capabilities {
        list: true,
        detail: true,
        create: true,
        edit: true,
        delete: true,
        bulk_delete: true,
        export: true,
    };

    /// Rows produced by the application itself; operators may correct or
    /// remove them but not invent them.
    pub const NO_CREATE: Capabilities = Capabilities {
        create: false,
        ..Capabilities::ALL
    };

    pub const READ_ONLY: Capabilities = Capabilities {
        list: true,
        detail: true,
        create: false,
        edit: false,
        delete: false,
        bulk_delete: false,
        export: true,
    };

    pub fn permits(&self, op: Operation) -> bool {
        match op {
            Operation::List => self.list,
            Operation::Detail => self.detail,
            Operation::Create => self.create,
            Operation::Edit => self.edit,
            Operation::Delete => self.delete,
            Operation::BulkDelete => self.bulk_delete,
            Operation::Export => self.export,
        }
    }
}

#[derive(Debug)]
pub struct EntityView {
    /// URL segment; also the table name.
    pub slug: &'static str,
    pub label: &'static str,
    pub label_plural: &'static str,
    pub list_columns: &'static [&'static str],
    pub detail_columns: &'static [&'static str],
    /// Columns never returned by list/detail/export (loaded on demand).
    pub deferred_columns: &'static [&'static str],
    pub fields: &'static [FieldSpec],
    pub search_columns: &'static [&'static str],
    pub sortable_columns: &'static [&'static str],
    pub capabilities: Capabilities,
}

impl EntityView {
    pub fn table(&self) -> &'static str {
        self.slug
    }

    pub fn permits(&self, op: Operation) -> bool {
        self.capabilities.permits(op)
    }
}

const STATUS: FieldKind = FieldKind::Choice(StudentStatus::VALUES);
const PROGRAM_FK: FieldKind = FieldKind::ForeignKey { table: "programs" };
const MODULE_FK: FieldKind = FieldKind::ForeignKey { table: "course_modules" };
const TOPIC_FK: FieldKind = FieldKind::ForeignKey { table: "topics" };
const NAME: FieldKind = FieldKind::Text { max_len: 150 };
const HOURS: FieldKind = FieldKind::Integer {
    min: Some(0),
    max: None,
};

pub static ENTITY_VIEWS: &[EntityView] = &[
    EntityView {
        slug: "programs",
        label: "Program",
        label_plural: "Programs",
        list_columns: &["id", "name", "total_hours", "created_at"],
        detail_columns: &["id", "name", "description", "total_hours", "created_at", "updated_at"],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("name", NAME),
            FieldSpec::optional("description", FieldKind::LongText),
            FieldSpec::optional("total_hours", HOURS),
        ],
        search_columns: &["name", "description"],
        sortable_columns: &["id", "name", "total_hours", "created_at"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "streams",
        label: "Stream",
        label_plural: "Streams",
        list_columns: &["id", "program_id", "name", "start_date", "end_date"],
        detail_columns: &["id", "program_id", "name", "start_date", "end_date", "description", "created_at"],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("program_id", PROGRAM_FK),
            FieldSpec::required("name", NAME),
            FieldSpec::required("start_date", FieldKind::Date),
            FieldSpec::required("end_date", FieldKind::Date),
            FieldSpec::optional("description", FieldKind::LongText),
        ],
        search_columns: &["name"],
        sortable_columns: &["id", "program_id", "name", "start_date", "end_date"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "students",
        label: "Student",
        label_plural: "Students",
        list_columns: &[
            "id", "last_name", "first_name", "phone", "telegram_username", "status", "program_id",
            "last_login_at",
        ],
        detail_columns: &[
            "id", "first_name", "last_name", "middle_name", "phone", "telegram_user_id",
            "telegram_chat_id", "telegram_username", "status", "program_id", "last_login_at",
            "created_at", "updated_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("first_name", FieldKind::Text { max_len: 100 }),
            FieldSpec::required("last_name", FieldKind::Text { max_len: 100 }),
            FieldSpec::optional("middle_name", FieldKind::Text { max_len: 100 }),
            FieldSpec::required("phone", FieldKind::Phone),
            FieldSpec::optional("telegram_user_id", FieldKind::BigInt),
            FieldSpec::optional("telegram_chat_id", FieldKind::BigInt),
            FieldSpec::optional("telegram_username", FieldKind::Text { max_len: 64 }),
            FieldSpec::defaulted("status", STATUS),
            FieldSpec::optional("program_id", PROGRAM_FK),
        ],
        search_columns: &["first_name", "last_name", "middle_name", "phone", "telegram_username"],
        sortable_columns: &["id", "last_name", "first_name", "status", "program_id", "last_login_at"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "course_modules",
        label: "Course module",
        label_plural: "Course modules",
        list_columns: &["id", "program_id", "order_index", "name"],
        detail_columns: &[
            "id", "program_id", "order_index", "name", "description", "lecture_hours",
            "practice_hours", "self_study_hours", "created_at", "updated_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("program_id", PROGRAM_FK),
            FieldSpec::defaulted("order_index", FieldKind::Integer { min: None, max: None }),
            FieldSpec::required("name", NAME),
            FieldSpec::optional("description", FieldKind::LongText),
            FieldSpec::defaulted("lecture_hours", HOURS),
            FieldSpec::defaulted("practice_hours", HOURS),
            FieldSpec::defaulted("self_study_hours", HOURS),
        ],
        search_columns: &["name", "description"],
        sortable_columns: &["id", "program_id", "order_index", "name"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "topics",
        label: "Topic",
        label_plural: "Topics",
        list_columns: &["id", "module_id", "order_index", "name"],
        detail_columns: &[
            "id", "module_id", "order_index", "name", "description", "has_intermediate_assessment",
            "has_final_assessment", "created_at", "updated_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("module_id", MODULE_FK),
            FieldSpec::defaulted("order_index", FieldKind::Integer { min: None, max: None }),
            FieldSpec::required("name", NAME),
            FieldSpec::optional("description", FieldKind::LongText),
            FieldSpec::defaulted("has_intermediate_assessment", FieldKind::Bool),
            FieldSpec::defaulted("has_final_assessment", FieldKind::Bool),
        ],
        search_columns: &["name", "description"],
        sortable_columns: &["id", "module_id", "order_index", "name"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "course_materials",
        label: "Course material",
        label_plural: "Course materials",
        list_columns: &["id", "program_id", "title", "category", "is_visible", "file_name"],
        detail_columns: &[
            "id", "program_id", "module_id", "topic_id", "title", "content", "external_url",
            "category", "is_visible", "file_name", "file_size", "mime_type", "created_at",
            "updated_at",
        ],
        deferred_columns: &["file_data"],
        fields: &[
            FieldSpec::required("program_id", PROGRAM_FK),
            FieldSpec::optional("module_id", MODULE_FK),
            FieldSpec::optional("topic_id", TOPIC_FK),
            FieldSpec::required("title", NAME),
            FieldSpec::optional("content", FieldKind::LongText),
            FieldSpec::optional("external_url", FieldKind::Url),
            FieldSpec::required("category", FieldKind::Choice(MaterialCategory::VALUES)),
            FieldSpec::defaulted("is_visible", FieldKind::Bool),
        ],
        search_columns: &["title", "content"],
        sortable_columns: &["id", "program_id", "title", "category", "is_visible"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "student_module_progress",
        label: "Module progress",
        label_plural: "Module progress",
        list_columns: &["id", "student_id", "module_id", "status", "progress_percent"],
        detail_columns: &[
            "id", "student_id", "module_id", "status", "completed_topics", "total_topics",
            "progress_percent", "created_at", "updated_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::defaulted("status", FieldKind::Choice(ProgressStatus::VALUES)),
            FieldSpec::defaulted("completed_topics", HOURS),
            FieldSpec::defaulted("total_topics", HOURS),
        ],
        search_columns: &["status"],
        sortable_columns: &["id", "student_id", "module_id", "status", "progress_percent"],
        capabilities: Capabilities::NO_CREATE,
    },
    EntityView {
        slug: "messages",
        label: "Message",
        label_plural: "Messages",
        list_columns: &["id", "student_id", "sender_role", "text_content", "created_at"],
        detail_columns: &[
            "id", "student_id", "sender_role", "text_content", "telegram_message_id", "created_at",
        ],
        deferred_columns: &[],
        fields: &[],
        search_columns: &["text_content", "sender_role"],
        sortable_columns: &["id", "student_id", "sender_role", "created_at"],
        capabilities: Capabilities::READ_ONLY,
    },
    EntityView {
        slug: "rate_limits",
        label: "Rate limit",
        label_plural: "Rate limits",
        list_columns: &["id", "student_id", "limit_date", "request_count"],
        detail_columns: &["id", "student_id", "limit_date", "request_count", "updated_at"],
        deferred_columns: &[],
        fields: &[FieldSpec::defaulted("request_count", HOURS)],
        search_columns: &[],
        sortable_columns: &["id", "student_id", "limit_date", "request_count"],
        capabilities: Capabilities::NO_CREATE,
    },
    EntityView {
        slug: "schedule_items",
        label: "Schedule item",
        label_plural: "Schedule items",
        list_columns: &["id", "module_id", "stream_id", "kind", "scheduled_date", "start_time"],
        detail_columns: &[
            "id", "module_id", "topic_id", "stream_id", "kind", "scheduled_date", "start_time",
            "end_time", "location", "created_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("module_id", MODULE_FK),
            FieldSpec::optional("topic_id", TOPIC_FK),
            FieldSpec::optional("stream_id", FieldKind::ForeignKey { table: "streams" }),
            FieldSpec::required("kind", FieldKind::Choice(ScheduleKind::VALUES)),
            FieldSpec::required("scheduled_date", FieldKind::Date),
            FieldSpec::optional("start_time", FieldKind::Time),
            FieldSpec::optional("end_time", FieldKind::Time),
            FieldSpec::optional("location", FieldKind::LongText),
        ],
        search_columns: &["location", "kind"],
        sortable_columns: &["id", "module_id", "stream_id", "kind", "scheduled_date", "start_time"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "attestation_tests",
        label: "Attestation test",
        label_plural: "Attestation tests",
        list_columns: &["id", "module_id", "title", "kind", "is_active"],
        detail_columns: &[
            "id", "module_id", "title", "kind", "max_score", "passing_score", "is_active",
            "created_at", "updated_at",
        ],
        deferred_columns: &[],
        fields: &[
            FieldSpec::required("module_id", MODULE_FK),
            FieldSpec::required("title", NAME),
            FieldSpec::required("kind", FieldKind::Choice(AttestationKind::VALUES)),
            FieldSpec::required("max_score", FieldKind::Integer { min: Some(1), max: None }),
            FieldSpec::required("passing_score", FieldKind::Integer { min: Some(1), max: None }),
            FieldSpec::defaulted("is_active", FieldKind::Bool),
        ],
        search_columns: &["title"],
        sortable_columns: &["id", "module_id", "title", "kind", "is_active"],
        capabilities: Capabilities::ALL,
    },
    EntityView {
        slug: "test_results",
        label: "Test result",
        label_plural: "Test results",
        list_columns: &["id", "test_id", "student_id", "attempt", "score", "passed"],
        detail_columns: &["id", "test_id", "student_id", "attempt", "score", "passed", "submitted_at"],
        deferred_columns: &[],
        fields: &[
            FieldSpec::defaulted("score", HOURS),
            FieldSpec::defaulted("passed", FieldKind::Bool),
        ],
        search_columns: &[],
        sortable_columns: &["id", "test_id", "student_id", "attempt", "score", "passed"],
        capabilities: Capabilities::NO_CREATE,
    },
    EntityView {
        slug: "feedback",
        label: "Feedback",
        label_plural: "Feedback",
        list_columns: &["id", "student_id", "module_id", "kind", "rating", "created_at"],
        detail_columns: &["id", "student_id", "module_id", "kind", "rating", "comment", "created_at"],
        deferred_columns: &[],
        fields: &[
            FieldSpec::defaulted("rating", FieldKind::Integer { min: Some(1), max: Some(5) }),
            FieldSpec::optional("comment", FieldKind::LongText),
            FieldSpec::defaulted("kind", FieldKind::Choice(FeedbackKind::VALUES)),
        ],
        search_columns: &["comment", "kind"],
        sortable_columns: &["id", "student_id", "module_id", "kind", "rating", "created_at"],
        capabilities: Capabilities::NO_CREATE,
    },
];

/// Look up a view by its URL slug.
pub fn find_view(slug: &str) -> Option<&'static EntityView> {
    ENTITY_VIEWS.iter().find(|v| v.slug == slug)
}
