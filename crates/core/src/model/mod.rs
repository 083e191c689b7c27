mod ids;
mod profile;
mod question;
mod records;

pub use ids::{LessonId, ParseIdError, SessionId, UserId};
pub use profile::{Language, LearningStatus, Level, Mode, ProfileError, UserProfile};
pub use question::{AnswerOption, OPTION_COUNT, ParseAnswerError, Question, QuestionError, Topic};
pub use records::{
    LESSON_TASK_LIMIT, LessonRecord, LessonStatus, LessonTask, QuizRecord, RecordError,
};
