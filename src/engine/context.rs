//! タスク実行コンテキストの管理
//!
//! # 責務
//!
//! - ワークフローの全ステップから参照されるエンティティ（顧客、患者、担当医、
//!   スケジュール、日付、任意の名前付きオブジェクト）を保持
//! - 階層的な参照: ローカルコンテキストは見つからないキーを親へ問い合わせる
//! - 型の一貫性: 同じキーに異なる種類の値を黙って上書きしない
//!
//! # 主要な型
//!
//! - [`TaskContext`][]: ワークフロー実行のキー/値ストア
//! - [`ContextValue`][]: 格納できる値
//! - [`keys`][]: よく使うキー名
//!
//! # 使用例
//!
//! ```rust
//! use vetflow::engine::context::{ContextValue, TaskContext};
//! use vetflow::service::Entity;
//!
//! let mut ctx = TaskContext::new();
//! ctx.set_patient(Entity::new("party.patientpet").with_id(1)).unwrap();
//!
//! // サブワークフロー用のローカルコンテキスト
//! let mut local = ctx.local();
//! assert!(local.patient().is_some()); // 親へフォールスルー
//!
//! local.set("reason", "Vaccination").unwrap();
//! assert!(local.get("reason").is_some());
//! assert!(ctx.get("reason").is_none()); // 書き込みはローカルのみ
//! ```

use std::collections::HashMap;
use std::time::SystemTime;

use crate::error::ContextError;
use crate::service::{Document, Entity};

/// よく使うコンテキストキー
pub mod keys {
    /// 顧客
    pub const CUSTOMER: &str = "customer";
    /// 患者
    pub const PATIENT: &str = "patient";
    /// 担当医
    pub const CLINICIAN: &str = "clinician";
    /// スケジュール
    pub const SCHEDULE: &str = "schedule";
    /// 病院
    pub const PRACTICE: &str = "practice";
    /// 所在地
    pub const LOCATION: &str = "location";
    /// ログインユーザー
    pub const USER: &str = "user";
    /// スケジュール日
    pub const SCHEDULE_DATE: &str = "schedule_date";
    /// ワークリスト
    pub const WORK_LIST: &str = "work_list";
    /// ワークリスト日
    pub const WORK_LIST_DATE: &str = "work_list_date";

    /// アーキタイプ名に対応する既定のキー
    ///
    /// 末尾の `*` は前方一致。どれにも一致しなければ `None` で、
    /// その場合はアーキタイプ名そのものがキーになります。
    pub fn for_kind(kind: &str) -> Option<&'static str> {
        const SLOTS: [(&str, &str); 6] = [
            ("party.customer*", CUSTOMER),
            ("party.patient*", PATIENT),
            ("security.user", CLINICIAN),
            ("party.organisationPractice", PRACTICE),
            ("party.organisationSchedule", SCHEDULE),
            ("party.organisationWorkList", WORK_LIST),
        ];
        SLOTS.iter().find_map(|(pattern, key)| {
            let matched = match pattern.strip_suffix('*') {
                Some(prefix) => kind.starts_with(prefix),
                None => kind == *pattern,
            };
            matched.then_some(*key)
        })
    }
}

/// コンテキストに格納できる値
#[derive(Debug, Clone, PartialEq)]
pub enum ContextValue {
    /// 永続化オブジェクト
    Entity(Entity),
    /// 生成済みドキュメント
    Document(Document),
    /// 文字列
    Text(String),
    /// 整数
    Integer(i64),
    /// 真偽値
    Flag(bool),
    /// 日時
    Time(SystemTime),
}

/// 値の種類（型チェック用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// [`ContextValue::Entity`]
    Entity,
    /// [`ContextValue::Document`]
    Document,
    /// [`ContextValue::Text`]
    Text,
    /// [`ContextValue::Integer`]
    Integer,
    /// [`ContextValue::Flag`]
    Flag,
    /// [`ContextValue::Time`]
    Time,
}

impl ContextValue {
    /// 値の種類
    pub fn kind(&self) -> ValueKind {
        match self {
            ContextValue::Entity(_) => ValueKind::Entity,
            ContextValue::Document(_) => ValueKind::Document,
            ContextValue::Text(_) => ValueKind::Text,
            ContextValue::Integer(_) => ValueKind::Integer,
            ContextValue::Flag(_) => ValueKind::Flag,
            ContextValue::Time(_) => ValueKind::Time,
        }
    }

    /// エンティティとして参照
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            ContextValue::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    /// ドキュメントとして参照
    pub fn as_document(&self) -> Option<&Document> {
        match self {
            ContextValue::Document(document) => Some(document),
            _ => None,
        }
    }

    /// 文字列として参照
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContextValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// 真偽値として参照
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ContextValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }

    /// 日時として参照
    pub fn as_time(&self) -> Option<SystemTime> {
        match self {
            ContextValue::Time(time) => Some(*time),
            _ => None,
        }
    }
}

impl From<Entity> for ContextValue {
    fn from(entity: Entity) -> Self {
        ContextValue::Entity(entity)
    }
}

impl From<Document> for ContextValue {
    fn from(document: Document) -> Self {
        ContextValue::Document(document)
    }
}

impl From<String> for ContextValue {
    fn from(text: String) -> Self {
        ContextValue::Text(text)
    }
}

impl From<&str> for ContextValue {
    fn from(text: &str) -> Self {
        ContextValue::Text(text.to_string())
    }
}

impl From<i64> for ContextValue {
    fn from(value: i64) -> Self {
        ContextValue::Integer(value)
    }
}

impl From<bool> for ContextValue {
    fn from(flag: bool) -> Self {
        ContextValue::Flag(flag)
    }
}

impl From<SystemTime> for ContextValue {
    fn from(time: SystemTime) -> Self {
        ContextValue::Time(time)
    }
}

/// タスク実行コンテキスト
///
/// ワークフロー 1 回の実行で全ステップが共有するキー/値ストアです。
/// `'p` は親コンテキストの借用期間で、ルートのコンテキストは `TaskContext<'static>` です。
///
/// # 不変条件
///
/// - 読み取りはローカル → 親の順に探す
/// - 書き込みは常にローカルのみ（親には影響しない）
/// - 見えている値と種類が異なる値の書き込みは [`ContextError::TypeMismatch`]
#[derive(Debug, Default)]
pub struct TaskContext<'p> {
    values: HashMap<String, ContextValue>,
    parent: Option<&'p TaskContext<'p>>,
}

impl TaskContext<'static> {
    /// 新しいルートコンテキストを生成
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            parent: None,
        }
    }
}

impl<'p> TaskContext<'p> {
    /// このコンテキストを親とするローカルコンテキストを生成
    ///
    /// ローカルコンテキストへの書き込みは親に反映されません。
    /// 親へ戻す値は呼び出し側（[`LocalTask`](crate::tasks::LocalTask) など）が明示的にコピーします。
    pub fn local(&self) -> TaskContext<'_> {
        TaskContext {
            values: HashMap::new(),
            parent: Some(self),
        }
    }

    /// 親コンテキストを持つか
    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// 値を取得（ローカルに無ければ親へフォールスルー）
    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        match self.values.get(key) {
            Some(value) => Some(value),
            None => self.parent.and_then(|parent| parent.get(key)),
        }
    }

    /// ローカルの値のみを取得
    pub fn get_local(&self, key: &str) -> Option<&ContextValue> {
        self.values.get(key)
    }

    /// キーが（親を含めて）存在するか
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 値を設定し、ローカルにあった以前の値を返す
    ///
    /// # エラー
    ///
    /// - [`ContextError::TypeMismatch`] - 見えている値と種類が異なる
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ContextValue>,
    ) -> Result<Option<ContextValue>, ContextError> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.get(&key) {
            if existing.kind() != value.kind() {
                return Err(ContextError::TypeMismatch {
                    key,
                    existing: existing.kind(),
                    attempted: value.kind(),
                });
            }
        }
        Ok(self.values.insert(key, value))
    }

    /// ローカルの値を削除
    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.values.remove(key)
    }

    /// エンティティを追加
    ///
    /// 顧客や患者など [`keys::for_kind`] が既定のキーを返すアーキタイプはそのキーに、
    /// それ以外はアーキタイプ名をキーとして格納します。
    /// 同じキーのエンティティがあれば上書きします。
    pub fn add_object(&mut self, entity: Entity) -> Result<(), ContextError> {
        let key = Self::object_key(entity.kind()).to_string();
        self.set(key, entity).map(|_| ())
    }

    /// アーキタイプ名でエンティティを取得
    ///
    /// 既定のキーに対応するアーキタイプは、そのキーに格納された同じアーキタイプの
    /// エンティティを返します。
    pub fn object(&self, kind: &str) -> Option<&Entity> {
        self.entity(Self::object_key(kind))
            .filter(|entity| entity.kind() == kind)
    }

    /// アーキタイプ名でローカルのエンティティを削除
    pub fn remove_object(&mut self, kind: &str) -> Option<Entity> {
        let key = Self::object_key(kind);
        match self.values.get(key) {
            Some(ContextValue::Entity(entity)) if entity.kind() == kind => {}
            _ => return None,
        }
        match self.values.remove(key) {
            Some(ContextValue::Entity(entity)) => Some(entity),
            _ => None,
        }
    }

    fn object_key(kind: &str) -> &str {
        keys::for_kind(kind).unwrap_or(kind)
    }

    /// キーでエンティティを取得
    pub fn entity(&self, key: &str) -> Option<&Entity> {
        self.get(key).and_then(ContextValue::as_entity)
    }

    /// キーでドキュメントを取得
    pub fn document(&self, key: &str) -> Option<&Document> {
        self.get(key).and_then(ContextValue::as_document)
    }

    /// キーで文字列を取得
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ContextValue::as_text)
    }

    /// キーで真偽値を取得
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ContextValue::as_flag)
    }

    /// キーで日時を取得
    pub fn time(&self, key: &str) -> Option<SystemTime> {
        self.get(key).and_then(ContextValue::as_time)
    }

    /// ローカルに格納されているキーの一覧
    pub fn local_keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// 顧客
    pub fn customer(&self) -> Option<&Entity> {
        self.entity(keys::CUSTOMER)
    }

    /// 顧客を設定
    pub fn set_customer(&mut self, customer: Entity) -> Result<(), ContextError> {
        self.set(keys::CUSTOMER, customer).map(|_| ())
    }

    /// 患者
    pub fn patient(&self) -> Option<&Entity> {
        self.entity(keys::PATIENT)
    }

    /// 患者を設定
    pub fn set_patient(&mut self, patient: Entity) -> Result<(), ContextError> {
        self.set(keys::PATIENT, patient).map(|_| ())
    }

    /// 担当医
    pub fn clinician(&self) -> Option<&Entity> {
        self.entity(keys::CLINICIAN)
    }

    /// 担当医を設定
    pub fn set_clinician(&mut self, clinician: Entity) -> Result<(), ContextError> {
        self.set(keys::CLINICIAN, clinician).map(|_| ())
    }

    /// スケジュール
    pub fn schedule(&self) -> Option<&Entity> {
        self.entity(keys::SCHEDULE)
    }

    /// スケジュールを設定
    pub fn set_schedule(&mut self, schedule: Entity) -> Result<(), ContextError> {
        self.set(keys::SCHEDULE, schedule).map(|_| ())
    }

    /// 病院
    pub fn practice(&self) -> Option<&Entity> {
        self.entity(keys::PRACTICE)
    }

    /// 病院を設定
    pub fn set_practice(&mut self, practice: Entity) -> Result<(), ContextError> {
        self.set(keys::PRACTICE, practice).map(|_| ())
    }

    /// 所在地
    pub fn location(&self) -> Option<&Entity> {
        self.entity(keys::LOCATION)
    }

    /// 所在地を設定
    pub fn set_location(&mut self, location: Entity) -> Result<(), ContextError> {
        self.set(keys::LOCATION, location).map(|_| ())
    }

    /// ログインユーザー
    pub fn user(&self) -> Option<&Entity> {
        self.entity(keys::USER)
    }

    /// ログインユーザーを設定
    pub fn set_user(&mut self, user: Entity) -> Result<(), ContextError> {
        self.set(keys::USER, user).map(|_| ())
    }

    /// スケジュール日
    pub fn schedule_date(&self) -> Option<SystemTime> {
        self.time(keys::SCHEDULE_DATE)
    }

    /// スケジュール日を設定
    pub fn set_schedule_date(&mut self, date: SystemTime) -> Result<(), ContextError> {
        self.set(keys::SCHEDULE_DATE, date).map(|_| ())
    }

    /// ワークリスト
    pub fn work_list(&self) -> Option<&Entity> {
        self.entity(keys::WORK_LIST)
    }

    /// ワークリストを設定
    pub fn set_work_list(&mut self, work_list: Entity) -> Result<(), ContextError> {
        self.set(keys::WORK_LIST, work_list).map(|_| ())
    }

    /// ワークリスト日
    pub fn work_list_date(&self) -> Option<SystemTime> {
        self.time(keys::WORK_LIST_DATE)
    }

    /// ワークリスト日を設定
    pub fn set_work_list_date(&mut self, date: SystemTime) -> Result<(), ContextError> {
        self.set(keys::WORK_LIST_DATE, date).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(id: u64) -> Entity {
        Entity::new("party.patientpet").with_id(id)
    }

    /// TaskContext::new() のテスト
    #[test]
    fn test_task_context_new() {
        let ctx = TaskContext::new();
        assert!(!ctx.has_parent());
        assert_eq!(ctx.local_keys().count(), 0);
        assert!(ctx.patient().is_none());
    }

    /// 値が無い場合は None（センチネルではない）
    #[test]
    fn test_absent_is_none() {
        let ctx = TaskContext::new();
        assert!(ctx.get("anything").is_none());
        assert!(!ctx.contains("anything"));
    }

    /// set() と get() のテスト
    #[test]
    fn test_set_and_get() {
        let mut ctx = TaskContext::new();
        let previous = ctx.set("reason", "Checkup").unwrap();
        assert!(previous.is_none());
        assert_eq!(ctx.text("reason"), Some("Checkup"));

        let previous = ctx.set("reason", "Surgery").unwrap();
        assert_eq!(previous, Some(ContextValue::Text("Checkup".to_string())));
        assert_eq!(ctx.text("reason"), Some("Surgery"));
    }

    /// 異なる種類の値による上書きは拒否される
    #[test]
    fn test_type_mismatch_is_rejected() {
        let mut ctx = TaskContext::new();
        ctx.set_patient(patient(1)).unwrap();

        let err = ctx.set(keys::PATIENT, "Fido").unwrap_err();
        assert_eq!(
            err,
            ContextError::TypeMismatch {
                key: "patient".to_string(),
                existing: ValueKind::Entity,
                attempted: ValueKind::Text,
            }
        );
        // 元の値は残っている
        assert_eq!(ctx.patient().and_then(Entity::id), Some(1));
    }

    /// add_object() はアーキタイプ名をキーにする
    #[test]
    fn test_add_object_uses_kind_as_key() {
        let mut ctx = TaskContext::new();
        ctx.add_object(Entity::new("act.customerTask").with_id(1))
            .unwrap();
        ctx.add_object(Entity::new("act.customerTask").with_id(2))
            .unwrap();

        let task = ctx.object("act.customerTask").unwrap();
        assert_eq!(task.id(), Some(2));
        assert_eq!(ctx.local_keys().count(), 1);
    }

    /// 患者や顧客のアーキタイプは既定のキーに格納される
    #[test]
    fn test_add_object_fills_well_known_slots() {
        let mut ctx = TaskContext::new();
        ctx.add_object(patient(7)).unwrap();
        ctx.add_object(Entity::new("party.customerperson").with_id(3))
            .unwrap();
        ctx.add_object(Entity::new("security.user").with_id(4)).unwrap();
        ctx.add_object(Entity::new("party.organisationWorkList").with_id(5))
            .unwrap();

        assert_eq!(ctx.patient().and_then(Entity::id), Some(7));
        assert_eq!(ctx.customer().and_then(Entity::id), Some(3));
        assert_eq!(ctx.clinician().and_then(Entity::id), Some(4));
        assert_eq!(ctx.work_list().and_then(Entity::id), Some(5));
        assert!(ctx.get("party.patientpet").is_none());
    }

    #[test]
    fn test_remove_object_uses_same_key() {
        let mut ctx = TaskContext::new();
        ctx.add_object(patient(7)).unwrap();
        ctx.add_object(Entity::new("act.patientWeight").with_id(1))
            .unwrap();

        assert!(ctx.remove_object("party.patientother").is_none());
        assert_eq!(ctx.remove_object("party.patientpet").and_then(|e| e.id()), Some(7));
        assert!(ctx.patient().is_none());
        assert!(ctx.remove_object("act.patientWeight").is_some());
        assert_eq!(ctx.local_keys().count(), 0);
    }

    /// set_patient() で設定した患者はアーキタイプ名でも取得できる
    #[test]
    fn test_object_reads_well_known_slots() {
        let mut root = TaskContext::new();
        root.set_patient(patient(2)).unwrap();
        root.set_customer(Entity::new("party.customerorganisation").with_id(8))
            .unwrap();

        let local = root.local();
        assert_eq!(local.object("party.patientpet").and_then(Entity::id), Some(2));
        assert_eq!(
            local.object("party.customerorganisation").and_then(Entity::id),
            Some(8)
        );
        // 同じキーでもアーキタイプが異なれば返さない
        assert!(local.object("party.customerperson").is_none());
        assert!(local.object("party.patientother").is_none());
    }

    #[test]
    fn test_for_kind() {
        assert_eq!(keys::for_kind("party.patientpet"), Some(keys::PATIENT));
        assert_eq!(keys::for_kind("party.organisationSchedule"), Some(keys::SCHEDULE));
        assert_eq!(keys::for_kind("security.userGroup"), None);
        assert_eq!(keys::for_kind("act.patientWeight"), None);
    }

    /// ローカルコンテキストは親へフォールスルーし、書き込みはローカルのみ
    #[test]
    fn test_local_context_falls_through() {
        let mut root = TaskContext::new();
        root.set_customer(Entity::new("party.customerperson").with_id(5))
            .unwrap();
        root.set_patient(patient(1)).unwrap();

        let mut local = root.local();
        assert!(local.has_parent());
        assert_eq!(local.customer().and_then(Entity::id), Some(5));

        local.set_patient(patient(2)).unwrap();
        assert_eq!(local.patient().and_then(Entity::id), Some(2));
        assert!(local.get_local(keys::CUSTOMER).is_none());

        drop(local);
        assert_eq!(root.patient().and_then(Entity::id), Some(1));
    }

    /// ローカルコンテキストでも親の値と種類が異なる書き込みは拒否される
    #[test]
    fn test_local_context_type_check_sees_parent() {
        let mut root = TaskContext::new();
        root.set_patient(patient(1)).unwrap();

        let mut local = root.local();
        assert!(local.set(keys::PATIENT, 3_i64).is_err());
    }

    /// 多段のローカルコンテキスト
    #[test]
    fn test_nested_local_contexts() {
        let mut root = TaskContext::new();
        root.set("flag", true).unwrap();

        let mut middle = root.local();
        middle.set("count", 3_i64).unwrap();

        let leaf = middle.local();
        assert_eq!(leaf.flag("flag"), Some(true));
        assert_eq!(
            leaf.get("count"),
            Some(&ContextValue::Integer(3))
        );
    }

    /// 日付アクセサのテスト
    #[test]
    fn test_dates() {
        let mut ctx = TaskContext::new();
        let now = SystemTime::now();
        ctx.set_schedule_date(now).unwrap();
        ctx.set_work_list_date(now).unwrap();
        assert_eq!(ctx.schedule_date(), Some(now));
        assert_eq!(ctx.work_list_date(), Some(now));
    }

    /// remove() はローカルの値のみ削除する
    #[test]
    fn test_remove_is_local() {
        let mut root = TaskContext::new();
        root.set("note", "root").unwrap();

        let mut local = root.local();
        local.set("note", "local").unwrap();
        assert_eq!(local.remove("note"), Some(ContextValue::Text("local".to_string())));
        assert_eq!(local.text("note"), Some("root"));
    }

    /// よく使うエンティティのアクセサ
    #[test]
    fn test_well_known_entities() {
        let mut ctx = TaskContext::new();
        ctx.set_clinician(Entity::new("security.user").with_id(1)).unwrap();
        ctx.set_user(Entity::new("security.user").with_id(2)).unwrap();
        ctx.set_practice(Entity::new("party.organisationPractice")).unwrap();
        ctx.set_location(Entity::new("party.organisationLocation")).unwrap();
        ctx.set_schedule(Entity::new("party.organisationSchedule")).unwrap();

        assert_eq!(ctx.clinician().and_then(Entity::id), Some(1));
        assert_eq!(ctx.user().and_then(Entity::id), Some(2));
        assert!(ctx.practice().is_some());
        assert!(ctx.location().is_some());
        assert!(ctx.schedule().is_some());
    }
}
